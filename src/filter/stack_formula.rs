//! Stack formulas such as `2H(LH)^3L`.
//!
//! A formula is a sequence of material symbols (letters), each optionally preceded by a
//! multiplication factor. Parentheses group a sub-formula which can be prefixed by a factor
//! (applied to all its members) and followed by `^n` (repeated `n` times). Whitespace is ignored.
//! A factor of 1 stands for a quarter wave at the center wavelength.
use std::collections::HashMap;

use itertools::Itertools;
use log::info;

use super::{Filter, Layer, Side};
use crate::{
    error::{FilmError, FilmResult},
    materials::Material,
};

struct Parser {
    chars: Vec<char>,
    pos: usize,
}
impl Parser {
    fn new(formula: &str) -> Self {
        Self {
            chars: formula.chars().filter(|c| !c.is_whitespace()).collect(),
            pos: 0,
        }
    }
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }
    fn error(&self, message: &str) -> FilmError {
        FilmError::Configuration(format!(
            "stack formula: {message} at position {}",
            self.pos
        ))
    }
    fn number(&mut self) -> FilmResult<Option<f64>> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.pos += 1;
        }
        if start == self.pos {
            return Ok(None);
        }
        let text: String = self.chars[start..self.pos].iter().collect();
        text.parse::<f64>()
            .map(Some)
            .map_err(|_| self.error(&format!("invalid number '{text}'")))
    }
    fn sequence(&mut self, nested: bool) -> FilmResult<Vec<(char, f64)>> {
        let mut items = Vec::new();
        loop {
            match self.peek() {
                None if nested => return Err(self.error("missing ')'")),
                None => return Ok(items),
                Some(')') if nested => {
                    self.pos += 1;
                    return Ok(items);
                }
                Some(_) => items.extend(self.item()?),
            }
        }
    }
    fn item(&mut self) -> FilmResult<Vec<(char, f64)>> {
        let factor = self.number()?.unwrap_or(1.0);
        if !(factor.is_finite() && factor >= 0.0) {
            return Err(self.error("invalid factor"));
        }
        let group = match self.peek() {
            Some('(') => {
                self.pos += 1;
                self.sequence(true)?
            }
            Some(c) if c.is_alphabetic() => {
                self.pos += 1;
                vec![(c, 1.0)]
            }
            Some(c) => return Err(self.error(&format!("unexpected '{c}'"))),
            None => return Err(self.error("missing symbol")),
        };
        let repeat = if self.peek() == Some('^') {
            self.pos += 1;
            let n = self
                .number()?
                .ok_or_else(|| self.error("missing exponent"))?;
            if n.fract() != 0.0 || n < 0.0 {
                return Err(self.error("exponent must be a non-negative integer"));
            }
            crate::utils::f64_to_usize(n)
        } else {
            1
        };
        let scaled: Vec<(char, f64)> = group.into_iter().map(|(c, f)| (c, f * factor)).collect();
        Ok(std::iter::repeat(scaled).take(repeat).flatten().collect())
    }
}

/// Expand a stack formula into `(symbol, factor)` pairs, merging identical adjacent symbols.
///
/// # Errors
///
/// This function will return an error if the formula is malformed.
pub fn analyse_stack_formula(formula: &str) -> FilmResult<Vec<(char, f64)>> {
    let items = Parser::new(formula).sequence(false)?;
    Ok(items
        .into_iter()
        .coalesce(|a, b| {
            if a.0 == b.0 {
                Ok((a.0, a.1 + b.1))
            } else {
                Err((a, b))
            }
        })
        .collect())
}

impl Filter {
    /// Replace the layers of `side` by the layers of a stack formula.
    ///
    /// `materials` maps every symbol to a material and, for mixtures, the index at the center
    /// wavelength. The first symbol becomes the layer touching the substrate. A factor `f` yields
    /// a layer of thickness `f·λc/(4n)`.
    ///
    /// # Errors
    ///
    /// This function will return an error if the formula is malformed, a symbol is not mapped or
    /// a material cannot be used. The filter is left unchanged in that case.
    pub fn apply_stack_formula(
        &mut self,
        side: Side,
        formula: &str,
        materials: &HashMap<char, (Material, Option<f64>)>,
    ) -> FilmResult<()> {
        let items = analyse_stack_formula(formula)?;
        let center = self.settings.center_wavelength;
        let mut layers = Vec::with_capacity(items.len());
        for (symbol, factor) in items {
            let (material, index) = materials.get(&symbol).ok_or_else(|| {
                FilmError::Configuration(format!("no material for symbol '{symbol}'"))
            })?;
            let index = if material.is_mixture() {
                let n = index.ok_or_else(|| {
                    FilmError::Configuration(format!(
                        "mixture {} needs an index",
                        material.name()
                    ))
                })?;
                self.check_mixture_index(material, n)?;
                Some(n)
            } else {
                None
            };
            let n = material.center_index(center, index)?;
            layers.push((material, factor * center / (4.0 * n), index));
        }
        let mut built = Vec::with_capacity(layers.len());
        for (material, thickness, index) in layers {
            built.push(Layer::homogeneous(
                self.get_material_nb(material)?,
                thickness,
                index,
            ));
        }
        info!("applying stack formula {formula} to the {side} side");
        self.replace_layers(side, built)
    }
}
