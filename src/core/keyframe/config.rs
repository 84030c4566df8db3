use super::error::{KeyframeError, Result};
use serde::{Deserialize, Serialize};

/// 一次运行的清晰度门限如何得出
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CutoffMode {
    /// `sharpness_cutoff_value` 即门限本身
    Fixed,
    /// `sharpness_cutoff_value` 为保留候选的比例
    Percentile,
    /// `sharpness_cutoff_value` 乘以随机预采样的均值
    DynamicBaseline,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchBounds {
    pub min_threshold: f64,
    pub max_threshold: f64,
    pub max_iterations: u32,
}

impl Default for SearchBounds {
    fn default() -> Self {
        Self {
            min_threshold: 15.0,
            max_threshold: 50.0,
            max_iterations: 7,
        }
    }
}

/// 空白/淡变检测的亮度界限 (0-255 亮度)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidityThresholds {
    pub dark_max: f64,
    pub bright_min: f64,
    pub flat_std: f64,
}

impl Default for ValidityThresholds {
    fn default() -> Self {
        Self {
            dark_max: 25.0,
            bright_min: 230.0,
            flat_std: 15.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyframeConfig {
    pub scene_threshold: f64,
    pub min_scene_len: u32,
    pub adaptive_target_count: Option<u32>,
    pub adaptive_tolerance: u32,
    pub search: SearchBounds,
    pub sharpness_cutoff_mode: CutoffMode,
    pub sharpness_cutoff_value: f64,
    pub baseline_samples: usize,
    pub baseline_seed: u64,
    pub dedup_hamming_bound: u32,
    pub fallback_rescue_count: usize,
    pub validity: ValidityThresholds,
}

impl Default for KeyframeConfig {
    fn default() -> Self {
        Self {
            scene_threshold: 27.0,
            min_scene_len: 15,
            adaptive_target_count: None,
            adaptive_tolerance: 5,
            search: SearchBounds::default(),
            sharpness_cutoff_mode: CutoffMode::Fixed,
            sharpness_cutoff_value: 100.0,
            baseline_samples: 10,
            baseline_seed: 0x5EED_F00D,
            dedup_hamming_bound: 5,
            fallback_rescue_count: 1,
            validity: ValidityThresholds::default(),
        }
    }
}

impl KeyframeConfig {
    pub fn adaptive(target: u32) -> Self {
        Self {
            adaptive_target_count: Some(target),
            ..Default::default()
        }
    }

    pub fn for_high_motion() -> Self {
        Self {
            scene_threshold: 32.0,
            min_scene_len: 8,
            sharpness_cutoff_mode: CutoffMode::Percentile,
            sharpness_cutoff_value: 0.3,
            dedup_hamming_bound: 6,
            ..Default::default()
        }
    }

    pub fn for_low_motion() -> Self {
        Self {
            scene_threshold: 22.0,
            min_scene_len: 24,
            sharpness_cutoff_mode: CutoffMode::DynamicBaseline,
            sharpness_cutoff_value: 0.5,
            dedup_hamming_bound: 4,
            ..Default::default()
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: KeyframeConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(KeyframeError::InvalidConfig(msg));

        // 允许 +inf：永不触发的阈值
        if self.scene_threshold.is_nan() || self.scene_threshold < 0.0 {
            return invalid(format!("scene_threshold {}", self.scene_threshold));
        }
        if !(self.search.min_threshold < self.search.max_threshold) {
            return invalid(format!(
                "search bounds [{}, {}] are empty",
                self.search.min_threshold, self.search.max_threshold
            ));
        }
        if self.search.max_iterations == 0 {
            return invalid("search.max_iterations must be > 0".into());
        }
        if self.adaptive_target_count == Some(0) {
            return invalid("adaptive_target_count must be > 0".into());
        }
        if self.fallback_rescue_count == 0 {
            return invalid("fallback_rescue_count must be > 0".into());
        }
        if self.dedup_hamming_bound > 64 {
            return invalid(format!(
                "dedup_hamming_bound {} exceeds 64-bit fingerprint",
                self.dedup_hamming_bound
            ));
        }
        // NaN 会让门限比较恒为 false，全部放行
        if !self.sharpness_cutoff_value.is_finite() {
            return invalid(format!(
                "sharpness_cutoff_value {} is not finite",
                self.sharpness_cutoff_value
            ));
        }
        match self.sharpness_cutoff_mode {
            CutoffMode::Percentile
                if !(self.sharpness_cutoff_value > 0.0 && self.sharpness_cutoff_value <= 1.0) =>
            {
                invalid(format!(
                    "percentile keep fraction {} not in (0, 1]",
                    self.sharpness_cutoff_value
                ))
            }
            CutoffMode::DynamicBaseline if self.sharpness_cutoff_value < 0.0 => invalid(format!(
                "baseline scale {} < 0",
                self.sharpness_cutoff_value
            )),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = KeyframeConfig::default();
        assert_eq!(config.scene_threshold, 27.0);
        assert_eq!(config.dedup_hamming_bound, 5);
        assert_eq!(config.fallback_rescue_count, 1);
        assert_eq!(config.search.max_iterations, 7);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_presets_are_valid() {
        assert!(KeyframeConfig::adaptive(40).validate().is_ok());
        assert!(KeyframeConfig::for_high_motion().validate().is_ok());
        assert!(KeyframeConfig::for_low_motion().validate().is_ok());
    }

    #[test]
    fn test_from_json_partial() {
        let config = KeyframeConfig::from_json(
            r#"{"adaptive_target_count": 12, "sharpness_cutoff_mode": "percentile", "sharpness_cutoff_value": 0.3}"#,
        )
        .unwrap();
        assert_eq!(config.adaptive_target_count, Some(12));
        assert_eq!(config.sharpness_cutoff_mode, CutoffMode::Percentile);
        assert_eq!(config.min_scene_len, 15);
    }

    #[test]
    fn test_from_json_rejects_bad_percentile() {
        let result = KeyframeConfig::from_json(
            r#"{"sharpness_cutoff_mode": "percentile", "sharpness_cutoff_value": 30}"#,
        );
        assert!(matches!(result, Err(KeyframeError::InvalidConfig(_))));
    }

    #[test]
    fn test_from_json_syntax_error() {
        let result = KeyframeConfig::from_json("{not json");
        assert!(matches!(result, Err(KeyframeError::Json(_))));
    }

    #[test]
    fn test_rejects_non_finite_cutoff() {
        for mode in [
            CutoffMode::Fixed,
            CutoffMode::Percentile,
            CutoffMode::DynamicBaseline,
        ] {
            for value in [f64::NAN, f64::INFINITY] {
                let config = KeyframeConfig {
                    sharpness_cutoff_mode: mode,
                    sharpness_cutoff_value: value,
                    ..Default::default()
                };
                assert!(
                    matches!(config.validate(), Err(KeyframeError::InvalidConfig(_))),
                    "{:?} {}",
                    mode,
                    value
                );
            }
        }
    }
}
