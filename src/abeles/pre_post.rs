//! Partial products of a layer stack.
//!
//! For layers `L_0 … L_{n-1}` (deposition order) the products before and after each layer are kept:
//!
//! ```text
//! pre[i]  = L_0 · … · L_{i-1}        (pre[0] = 1, pre[n] = global matrix)
//! post[i] = L_{i+1} · … · L_{n-1}    (post[n-1] = 1)
//! ```
//!
//! A perturbation `X` of layer `i` then changes the global matrix to `pre[i] · X · post[i]`, which
//! costs two matrix products regardless of the number of layers.
use super::CharacteristicMatrix;

/// Cached partial products of a stack of layer matrices.
#[derive(Debug, Clone)]
pub struct PrePostMatrices {
    pre: Vec<CharacteristicMatrix>,
    post: Vec<CharacteristicMatrix>,
}
impl PrePostMatrices {
    /// Compute the partial products of `layers`, all sampled on `len` wavelengths.
    #[must_use]
    pub fn new(layers: &[CharacteristicMatrix], len: usize) -> Self {
        let mut pre = Vec::with_capacity(layers.len() + 1);
        pre.push(CharacteristicMatrix::new(len));
        for layer in layers {
            let mut next = pre[pre.len() - 1].clone();
            next.multiply(layer);
            pre.push(next);
        }
        let mut post = vec![CharacteristicMatrix::new(len); layers.len()];
        for i in (0..layers.len().saturating_sub(1)).rev() {
            let mut previous = post[i + 1].clone();
            previous.pre_multiply(&layers[i + 1]);
            post[i] = previous;
        }
        Self { pre, post }
    }
    /// Number of layers.
    #[must_use]
    pub fn nb_layers(&self) -> usize {
        self.post.len()
    }
    /// The product of all layers.
    #[must_use]
    pub fn global(&self) -> &CharacteristicMatrix {
        &self.pre[self.pre.len() - 1]
    }
    /// The product of the layers below layer `i`.
    #[must_use]
    pub fn pre(&self, i: usize) -> &CharacteristicMatrix {
        &self.pre[i]
    }
    /// The product of the layers above layer `i`.
    #[must_use]
    pub fn post(&self, i: usize) -> &CharacteristicMatrix {
        &self.post[i]
    }
    /// Embed `local` at the place of layer `i`: `out = pre[i] · local · post[i]`.
    ///
    /// With `local` the derivative of layer `i` this yields the derivative of the global matrix.
    pub fn propagate(&self, i: usize, local: &CharacteristicMatrix, out: &mut CharacteristicMatrix) {
        out.set_product(&self.pre[i], local);
        out.multiply(&self.post[i]);
    }
}
