use serde::{Deserialize, Serialize};

use crate::util_3d::{self, Vector2};
use super::{InvalidOptionsError, Model};

/// How the spanning trees choose their fold edges.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum FoldPreference {
    /// Prefer folding the flattest joins.
    #[default]
    Flat,
    /// Prefer joins unlikely to overlap, so fewer re-cuts split the islands.
    LargeIslands,
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldWeights {
    pub flatness: f32,
    pub overlap: f32,
}

impl FoldPreference {
    pub fn weights(self) -> FoldWeights {
        match self {
            FoldPreference::Flat => FoldWeights { flatness: 1.0, overlap: 0.25 },
            FoldPreference::LargeIslands => FoldWeights { flatness: 0.25, overlap: 1.0 },
        }
    }
}

/// Every length is in millimetres of paper, every angle in degrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaperOptions {
    pub scale: f32,
    pub page_size: (f32, f32),
    pub margin: f32,
    pub spacing: f32,
    pub flap_width: f32,
    pub flap_angle: f32,
    pub flap_min_width: f32,
    pub max_iterations: u32,
    pub fold_preference: FoldPreference,
    // Overrides the weights of `fold_preference`
    pub fold_weights: Option<FoldWeights>,
    pub hidden_line_angle: f32,
    pub label_font_size: f32,
    pub show_page_number: bool,
}

impl Default for PaperOptions {
    fn default() -> Self {
        PaperOptions {
            scale: 1.0,
            page_size: (210.0, 297.0),
            margin: 10.0,
            spacing: 3.0,
            flap_width: 5.0,
            flap_angle: 45.0,
            flap_min_width: 1.5,
            max_iterations: 1000,
            fold_preference: FoldPreference::Flat,
            fold_weights: None,
            hidden_line_angle: 0.0,
            label_font_size: 2.5,
            show_page_number: true,
        }
    }
}

impl PaperOptions {
    pub fn fold_weights(&self) -> FoldWeights {
        self.fold_weights.unwrap_or_else(|| self.fold_preference.weights())
    }
    pub fn page_size(&self) -> Vector2 {
        Vector2::new(self.page_size.0, self.page_size.1)
    }
    /// The part of a page where islands can be placed.
    pub fn usable_size(&self) -> Vector2 {
        self.page_size() - Vector2::new(2.0, 2.0) * self.margin
    }
    /// Checks that every value makes sense, lengths and angles alike.
    pub fn validate(&self) -> Result<(), InvalidOptionsError> {
        let fail = |option, reason| Err(InvalidOptionsError { option, reason });
        let positive = |x: f32| x.is_finite() && x > 0.0;
        let non_negative = |x: f32| x.is_finite() && x >= 0.0;

        if !positive(self.scale) {
            return fail("scale", "must be a positive number");
        }
        if !positive(self.page_size.0) || !positive(self.page_size.1) {
            return fail("page_size", "must be positive");
        }
        if !non_negative(self.margin) {
            return fail("margin", "must be zero or more");
        }
        let usable = self.usable_size();
        if usable.x <= 0.0 || usable.y <= 0.0 {
            return fail("margin", "leaves no room in the page");
        }
        if !non_negative(self.spacing) {
            return fail("spacing", "must be zero or more");
        }
        if !positive(self.flap_width) {
            return fail("flap_width", "must be positive");
        }
        if !positive(self.flap_min_width) || self.flap_min_width > self.flap_width {
            return fail("flap_min_width", "must be positive and not above flap_width");
        }
        if !positive(self.flap_angle) || self.flap_angle > 90.0 {
            return fail("flap_angle", "must be above 0 and up to 90 degrees");
        }
        if !non_negative(self.hidden_line_angle) || self.hidden_line_angle > 180.0 {
            return fail("hidden_line_angle", "must be between 0 and 180 degrees");
        }
        if !positive(self.label_font_size) {
            return fail("label_font_size", "must be positive");
        }
        if let Some(w) = self.fold_weights {
            if !non_negative(w.flatness) || !non_negative(w.overlap) {
                return fail("fold_weights", "must be zero or more");
            }
        }
        Ok(())
    }
    /// Sets the scale so that the model spans half the page, with a round value.
    pub fn auto_scale(&mut self, model: &Model) {
        let (v_min, v_max) = util_3d::bounding_box_3d(model.vertices().map(|(_, v)| v.pos()));
        let size = (v_max.x - v_min.x).max(v_max.y - v_min.y).max(v_max.z - v_min.z);
        if size <= 0.0 {
            return;
        }
        let paper_size = self.page_size.0.max(self.page_size.1);
        let scale = paper_size / size / 2.0;
        self.scale = if scale > 1.0 {
            scale.round()
        } else {
            (((1.0 / (1.0 / scale).round()) * 100.0).round() / 100.0).max(0.01)
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let opts: PaperOptions = serde_json::from_str(r#"{"margin": 5.0, "fold_preference": "large_islands"}"#).unwrap();
        assert_eq!(opts.margin, 5.0);
        assert_eq!(opts.page_size, (210.0, 297.0));
        assert_eq!(opts.fold_weights(), FoldPreference::LargeIslands.weights());
        assert_eq!(opts.usable_size(), Vector2::new(200.0, 287.0));
    }

    #[test]
    fn explicit_weights_win() {
        let opts = PaperOptions {
            fold_weights: Some(FoldWeights { flatness: 0.0, overlap: 2.0 }),
            ..PaperOptions::default()
        };
        assert_eq!(opts.fold_weights().overlap, 2.0);
    }

    #[test]
    fn validation() {
        assert_eq!(PaperOptions::default().validate(), Ok(()));
        let rejected = |opts: PaperOptions| opts.validate().unwrap_err().option;
        let d = PaperOptions::default;
        assert_eq!(rejected(PaperOptions { scale: 0.0, ..d() }), "scale");
        assert_eq!(rejected(PaperOptions { scale: f32::NAN, ..d() }), "scale");
        assert_eq!(rejected(PaperOptions { page_size: (210.0, f32::INFINITY), ..d() }), "page_size");
        assert_eq!(rejected(PaperOptions { margin: 150.0, ..d() }), "margin");
        assert_eq!(rejected(PaperOptions { spacing: -1.0, ..d() }), "spacing");
        assert_eq!(rejected(PaperOptions { flap_width: 0.0, ..d() }), "flap_width");
        assert_eq!(rejected(PaperOptions { flap_min_width: 6.0, ..d() }), "flap_min_width");
        assert_eq!(rejected(PaperOptions { flap_angle: 0.0, ..d() }), "flap_angle");
        assert_eq!(rejected(PaperOptions { flap_angle: 120.0, ..d() }), "flap_angle");
        assert_eq!(rejected(PaperOptions { label_font_size: f32::NAN, ..d() }), "label_font_size");
        assert_eq!(
            rejected(PaperOptions { fold_weights: Some(FoldWeights { flatness: -1.0, overlap: 1.0 }), ..d() }),
            "fold_weights"
        );
        // A square flap is fine
        assert_eq!(PaperOptions { flap_angle: 90.0, ..d() }.validate(), Ok(()));
    }

    #[test]
    fn auto_scale_rounds() {
        let model = crate::paper::testing::cube(1.0);
        let mut opts = PaperOptions::default();
        opts.auto_scale(&model);
        // 297 / 1 / 2 = 148.5
        assert_eq!(opts.scale, 149.0);

        let model = crate::paper::testing::cube(1000.0);
        opts.auto_scale(&model);
        // 0.1485 -> 1/7 -> 0.14
        assert_eq!(opts.scale, 0.14);
    }
}
