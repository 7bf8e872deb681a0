//! Decoder pool (spec.md §4.4): incremental RREF over received coefficient
//! vectors, with a parallel inverse-transform matrix so cleartext can be
//! reconstructed the moment a row becomes a clean unit vector.
//!
//! The reference pseudocode assumes pivot column `i` always lands exactly
//! on row `i` and special-cases the first insertion. Per spec.md §9's
//! preferred resolution we treat every insertion uniformly: each row
//! records whichever column it actually pivots on (`pivot_cols`), and
//! `extract_packets` runs full Gauss-Jordan elimination on a scratch copy
//! rather than relying on in-place mutation order.

use crate::error::TransportError;
use crate::gf::Field;
use crate::matrix::Matrix;
use crate::packet::{ClearPacket, EncodedPacket};
use log::debug;

pub struct DecoderPool {
    n_coeffs: usize,
    packets: Vec<EncodedPacket>,
    /// Row i's coefficient vector after the row reductions applied at
    /// insertion time (spec.md's `rrefCoeffs`).
    rref: Matrix,
    /// Column each row pivots on; not necessarily equal to the row index.
    pivot_cols: Vec<usize>,
    /// Row i is the linear combination of received coefficient vectors
    /// that produced `rref`'s row i (spec.md's `invertedCoeffs`), square
    /// and growing by one row and one column per insertion.
    inverted: Vec<Vec<u8>>,
    /// Which source indices (coefficient-vector positions) have already
    /// been delivered upstream.
    delivered: Vec<bool>,
}

impl DecoderPool {
    pub fn new(n_coeffs: usize) -> Self {
        DecoderPool {
            n_coeffs,
            packets: Vec::new(),
            rref: Matrix::zero(0, n_coeffs),
            pivot_cols: Vec::new(),
            inverted: Vec::new(),
            delivered: vec![false; n_coeffs],
        }
    }

    pub fn n_packets(&self) -> usize {
        self.packets.len()
    }

    pub fn rank(&self) -> usize {
        self.n_packets()
    }

    /// Returns `Ok(true)` iff the packet strictly increased the rank of
    /// the pool's coefficient matrix. Rejects (without mutating) a
    /// coefficient vector of the wrong width.
    pub fn add_if_innovative(
        &mut self,
        field: &Field,
        packet: EncodedPacket,
    ) -> Result<bool, TransportError> {
        if packet.coeffs.len() != self.n_coeffs {
            return Err(TransportError::CoefficientWidthMismatch {
                expected: self.n_coeffs,
                got: packet.coeffs.len(),
            });
        }

        let n = self.n_packets();
        let mut r = packet.coeffs.clone();
        let mut u = vec![0u8; n + 1];
        u[n] = 1;

        for i in 0..n {
            let pivot_col = self.pivot_cols[i];
            let factor = r[pivot_col];
            if factor != 0 {
                field.row_mul_sub(&mut r, self.rref.row(i), factor, self.n_coeffs);
                let inv_row = self.inverted[i].clone();
                field.row_mul_sub(&mut u[..n], &inv_row, factor, n);
            }
        }

        let pivot = (0..self.n_coeffs).find(|&c| r[c] != 0);
        let pivot = match pivot {
            None => {
                debug!("non-innovative packet rejected, rank stays {}", n);
                return Ok(false);
            }
            Some(c) => c,
        };

        let pivot_val = r[pivot];
        field.row_reduce(&mut r, pivot_val, self.n_coeffs);
        field.row_reduce(&mut u, pivot_val, n + 1);

        for row in self.inverted.iter_mut() {
            row.push(0);
        }
        self.inverted.push(u);
        self.rref.append_row(r);
        self.pivot_cols.push(pivot);
        self.packets.push(packet);
        debug!("innovative packet accepted, pivot col {}, rank now {}", pivot, n + 1);
        Ok(true)
    }

    /// Runs Gauss-Jordan elimination to full reduced row-echelon form on a
    /// scratch copy, then delivers every row that has become a clean unit
    /// vector and whose source index has not already been delivered.
    /// Idempotent: a call with no intervening insertion delivers nothing
    /// new (P7).
    pub fn extract_packets(&mut self, field: &Field) -> Vec<(usize, ClearPacket)> {
        let n = self.n_packets();
        if n == 0 {
            return Vec::new();
        }

        let mut rref_scratch: Vec<Vec<u8>> = (0..n).map(|i| self.rref.row(i).to_vec()).collect();
        let mut inv_scratch: Vec<Vec<u8>> = self.inverted.clone();

        // Descending insertion order: by construction row i already has a
        // zero at pivot_cols[j] for every j < i (eliminated at insert
        // time); processing from the last-inserted row backward means
        // each row used as an elimination source has already had its own
        // super-diagonal entries cleared by the time it is read.
        for i in (0..n).rev() {
            let pivot_col = self.pivot_cols[i];
            let src_rref = rref_scratch[i].clone();
            let src_inv = inv_scratch[i].clone();
            for j in 0..n {
                if j == i {
                    continue;
                }
                let factor = rref_scratch[j][pivot_col];
                if factor != 0 {
                    field.row_mul_sub(&mut rref_scratch[j], &src_rref, factor, self.n_coeffs);
                    field.row_mul_sub(&mut inv_scratch[j], &src_inv, factor, n);
                }
            }
        }

        let packet_len = self.packets[0].payload.len();
        let mut delivered = Vec::new();
        for i in 0..n {
            let pivot_col = self.pivot_cols[i];
            let clean = rref_scratch[i][pivot_col] == 1
                && (0..self.n_coeffs).all(|k| k == pivot_col || rref_scratch[i][k] == 0);
            if !clean || self.delivered[pivot_col] {
                continue;
            }

            let mut payload = vec![0u8; packet_len];
            for (k, &coeff) in inv_scratch[i].iter().enumerate() {
                if coeff == 0 {
                    continue;
                }
                for (out, &b) in payload.iter_mut().zip(self.packets[k].payload.iter()) {
                    *out = field.gadd(*out, field.gmul(coeff, b));
                }
            }
            self.delivered[pivot_col] = true;
            delivered.push((pivot_col, ClearPacket::new(payload)));
        }

        delivered.sort_by_key(|(idx, _)| *idx);
        delivered
    }
}
