//! Recognized configuration options (spec.md §6), loadable from a TOML
//! document the way the teacher's `AppConfig` loads its sub-configs.

use serde::Deserialize;
use std::path::Path;

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    pub packet_length: usize,
    pub coding_window: usize,
    pub encoded_per_source_ratio: f32,
    pub loss_simulation: f32,
    pub field_polynomial: u16,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            packet_length: 1500,
            coding_window: 10,
            encoded_per_source_ratio: 1.5,
            loss_simulation: 0.0,
            field_polynomial: crate::gf::DEFAULT_POLYNOMIAL,
        }
    }
}

impl Config {
    pub fn from_toml(s: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(s)
    }

    pub fn from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)?;
        Ok(Self::from_toml(&contents)?)
    }

    /// Rejects configurations that cannot produce a usable flow: a zero
    /// coding window, an out-of-range loss rate, or a polynomial whose
    /// table construction does not yield a field (every nonzero element
    /// must have a multiplicative inverse).
    pub fn validate(&self) -> Result<(), String> {
        if self.coding_window == 0 {
            return Err("coding_window must be at least 1".into());
        }
        if !(0.0..=1.0).contains(&self.loss_simulation) {
            return Err("loss_simulation must be in [0, 1]".into());
        }
        if self.encoded_per_source_ratio < 1.0 {
            return Err("encoded_per_source_ratio must be >= 1.0".into());
        }
        let field = crate::gf::Field::new(self.field_polynomial);
        for a in 1u16..256 {
            let a = a as u8;
            let inv = field.ginv(a);
            if field.gmul(a, inv) != 1 {
                return Err(format!(
                    "field_polynomial {:#x} is not irreducible over GF(2^8)",
                    self.field_polynomial
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.packet_length, 1500);
        assert_eq!(cfg.coding_window, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn parse_config_toml() {
        let cfg_str = r#"
            packet_length = 1200
            coding_window = 16
            encoded_per_source_ratio = 2.0
            loss_simulation = 0.1
        "#;
        let cfg = Config::from_toml(cfg_str).unwrap();
        assert_eq!(cfg.packet_length, 1200);
        assert_eq!(cfg.coding_window, 16);
        assert_eq!(cfg.field_polynomial, crate::gf::DEFAULT_POLYNOMIAL);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_zero_window() {
        let mut cfg = Config::default();
        cfg.coding_window = 0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_reducible_polynomial() {
        let mut cfg = Config::default();
        cfg.field_polynomial = 0x100; // x^8, reducible
        assert!(cfg.validate().is_err());
    }
}
