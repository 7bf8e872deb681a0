//! GF(2^8) arithmetic: log/antilog tables built once at startup, plus the
//! row-level helpers the decoder's incremental RREF is built on.

use std::sync::OnceLock;

/// Standard AES irreducible polynomial, x^8 + x^4 + x^3 + x^2 + 1.
pub const DEFAULT_POLYNOMIAL: u16 = 0x11D;

struct Tables {
    log: [u8; 256],
    exp: [u8; 512],
}

fn build_tables(poly: u16) -> Tables {
    let mut log = [0u8; 256];
    let mut exp = [0u8; 512];
    let mut x: u16 = 1;
    for i in 0..255usize {
        exp[i] = x as u8;
        exp[i + 255] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x >= 256 {
            x ^= poly;
        }
    }
    Tables { log, exp }
}

/// A self-contained GF(2^8) field over a chosen irreducible polynomial.
///
/// Implementations may run several `Field`s with different polynomials
/// side by side (e.g. one per test); the module-level [`field`] accessor
/// caches the default field that `FIELD_POLYNOMIAL` configures.
pub struct Field {
    tables: Tables,
}

impl Field {
    pub fn new(polynomial: u16) -> Self {
        Field {
            tables: build_tables(polynomial),
        }
    }

    #[inline(always)]
    pub fn gadd(&self, a: u8, b: u8) -> u8 {
        a ^ b
    }

    #[inline(always)]
    pub fn gmul(&self, a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        let log_a = self.tables.log[a as usize] as u16;
        let log_b = self.tables.log[b as usize] as u16;
        self.tables.exp[(log_a + log_b) as usize]
    }

    /// Multiplicative inverse of `a`. Panics on `a == 0`, mirroring the
    /// fact that division by zero is undefined in the field.
    #[inline(always)]
    pub fn ginv(&self, a: u8) -> u8 {
        assert!(a != 0, "no multiplicative inverse for 0 in GF(2^8)");
        self.tables.exp[255 - self.tables.log[a as usize] as usize]
    }

    /// `a / b`. Fails only when `b == 0`.
    #[inline(always)]
    pub fn gdiv(&self, a: u8, b: u8) -> Option<u8> {
        if b == 0 {
            return None;
        }
        if a == 0 {
            return Some(0);
        }
        let log_a = self.tables.log[a as usize] as i16;
        let log_b = self.tables.log[b as usize] as i16;
        let mut diff = log_a - log_b;
        if diff < 0 {
            diff += 255;
        }
        Some(self.tables.exp[diff as usize])
    }

    /// Scales the first `n` bytes of `row` by `1/factor` so the pivot
    /// entry (wherever it is) becomes 1 once divided through.
    pub fn row_reduce(&self, row: &mut [u8], factor: u8, n: usize) {
        if factor == 0 {
            return;
        }
        for b in row[..n].iter_mut() {
            *b = self.gdiv(*b, factor).expect("factor checked nonzero above");
        }
    }

    /// `dst[i] ^= factor * src[i]` for `i in [0, n)` — eliminate `dst` by
    /// subtracting `factor` times `src`.
    pub fn row_mul_sub(&self, dst: &mut [u8], src: &[u8], factor: u8, n: usize) {
        if factor == 0 {
            return;
        }
        for i in 0..n {
            dst[i] ^= self.gmul(factor, src[i]);
        }
    }
}

static DEFAULT_FIELD: OnceLock<Field> = OnceLock::new();

/// The process-wide default field, built once from `DEFAULT_POLYNOMIAL`
/// on first use. Configuring a different `FIELD_POLYNOMIAL` requires
/// constructing a dedicated [`Field`] instead of using this accessor.
pub fn field() -> &'static Field {
    DEFAULT_FIELD.get_or_init(|| Field::new(DEFAULT_POLYNOMIAL))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gf_sanity_scenario() {
        let f = Field::new(0x11B);
        assert_eq!(f.gadd(0x57, 0x83), 0xD4);
        assert_eq!(f.gmul(0x57, 0x83), 0xC1);
    }

    #[test]
    fn field_laws_p1() {
        let f = field();
        for a in 0u16..256 {
            for b in 0u16..256 {
                let (a, b) = (a as u8, b as u8);
                assert_eq!(f.gadd(a, b), f.gadd(b, a));
                assert_eq!(f.gmul(a, b), f.gmul(b, a));
            }
        }
        for a in 1u16..256 {
            let a = a as u8;
            let inv = f.ginv(a);
            assert_eq!(f.gmul(a, inv), 1);
            assert_eq!(f.gdiv(a, a), Some(1));
        }
        assert_eq!(f.gdiv(5, 0), None);
        for a in 0u16..256 {
            assert_eq!(f.gadd(a as u8, 0), a as u8);
            assert_eq!(f.gmul(a as u8, 1), a as u8);
        }
    }

    #[test]
    fn row_ops_match_scalar_field_ops() {
        let f = field();
        let mut row = [0x02u8, 0x03, 0x04];
        f.row_reduce(&mut row, 0x02, 3);
        assert_eq!(row[0], 1);

        let mut dst = [0x05u8, 0x06, 0x07];
        let src = [0x01u8, 0x01, 0x01];
        let before = dst;
        f.row_mul_sub(&mut dst, &src, 0x03, 3);
        for i in 0..3 {
            assert_eq!(dst[i], before[i] ^ f.gmul(0x03, src[i]));
        }
    }
}
