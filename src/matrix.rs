//! Dense row-major byte matrix over GF(2^8), the substrate the decoder
//! pool keeps its RREF coefficient matrix and inverse-transform matrix in.

use crate::gf::Field;
use rand::RngCore;

#[derive(Clone)]
pub struct Matrix {
    rows: Vec<Vec<u8>>,
    cols: usize,
}

impl Matrix {
    pub fn zero(rows: usize, cols: usize) -> Self {
        Matrix {
            rows: vec![vec![0u8; cols]; rows],
            cols,
        }
    }

    pub fn random(rows: usize, cols: usize, rng: &mut impl RngCore) -> Self {
        let mut m = Matrix::zero(rows, cols);
        for row in m.rows.iter_mut() {
            rng.fill_bytes(row);
        }
        m
    }

    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn num_cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, i: usize) -> &[u8] {
        &self.rows[i]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [u8] {
        &mut self.rows[i]
    }

    /// Appends a row, amortized O(cols): the backing `Vec<Vec<u8>>` grows
    /// like any other push, no separate reallocation bookkeeping needed.
    pub fn append_row(&mut self, row: Vec<u8>) {
        debug_assert_eq!(row.len(), self.cols);
        self.rows.push(row);
    }

    pub fn row_reduce(&mut self, field: &Field, row: usize, factor: u8) {
        let n = self.cols;
        field.row_reduce(&mut self.rows[row], factor, n);
    }

    /// `rows[dst] ^= factor * rows[src]`. `dst` and `src` must differ —
    /// elimination always operates on a scratch copy when they would
    /// coincide, never aliasing the same row in place.
    pub fn row_mul_sub(&mut self, field: &Field, dst: usize, src: usize, factor: u8) {
        assert_ne!(dst, src, "row_mul_sub must not alias a row with itself");
        let n = self.cols;
        let src_row = self.rows[src].clone();
        field.row_mul_sub(&mut self.rows[dst], &src_row, factor, n);
    }

    pub fn print(&self) -> String {
        let mut s = String::new();
        for row in &self.rows {
            for (i, b) in row.iter().enumerate() {
                if i > 0 {
                    s.push(' ');
                }
                s.push_str(&format!("{:02x}", b));
            }
            s.push('\n');
        }
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_fill_is_deterministic_under_seed() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);
        let m1 = Matrix::random(3, 4, &mut a);
        let m2 = Matrix::random(3, 4, &mut b);
        for i in 0..3 {
            assert_eq!(m1.row(i), m2.row(i));
        }
    }

    #[test]
    fn append_row_grows_and_preserves_earlier_rows() {
        let mut m = Matrix::zero(0, 2);
        m.append_row(vec![1, 2]);
        m.append_row(vec![3, 4]);
        assert_eq!(m.num_rows(), 2);
        assert_eq!(m.row(0), &[1, 2]);
        assert_eq!(m.row(1), &[3, 4]);
    }
}
