use serde::{Deserialize, Serialize};

/// Id of the implicit control variant.
pub const CONTROL_VARIANT_ID: &str = "original";
/// Display name of the implicit control variant.
pub const CONTROL_VARIANT_NAME: &str = "Original";

/// One weighted alternative for a selection key.
///
/// Used for both page-level tests (payload is the target page id) and block variants (payload
/// is the block configuration).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Variant<P> {
    /// Id persisted as the assignment.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Declared share of traffic, `0..=100`.
    pub traffic_percentage: f64,
    /// What the caller receives when this variant is selected.
    pub payload: P,
}

impl<P> Variant<P> {
    /// Synthesize the control variant for `variants`. Control receives whatever traffic the
    /// explicit variants leave over, floored at zero.
    pub(crate) fn control(variants: &[Variant<P>], payload: P) -> Variant<P> {
        let declared: f64 = variants.iter().map(Variant::weight).sum();
        Variant {
            id: CONTROL_VARIANT_ID.to_owned(),
            name: CONTROL_VARIANT_NAME.to_owned(),
            traffic_percentage: (100.0 - declared).max(0.0),
            payload,
        }
    }

    /// Weight used in the draw. Negative and non-finite percentages count as zero.
    pub(crate) fn weight(&self) -> f64 {
        if self.traffic_percentage.is_finite() && self.traffic_percentage > 0.0 {
            self.traffic_percentage
        } else {
            0.0
        }
    }

    /// Whether this is the implicit control variant.
    pub fn is_control(&self) -> bool {
        self.id == CONTROL_VARIANT_ID
    }
}

/// Why a [`Resolution`] picked its variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssignmentReason {
    /// No variants were declared; control is returned without touching storage.
    NoTest,
    /// A stored assignment matched a current candidate.
    Sticky,
    /// First sight of the key; a new variant was drawn and persisted.
    Assigned,
    /// The stored variant no longer exists; a new one was drawn and persisted.
    Reassigned,
}

/// Outcome of resolving a selection key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resolution<P> {
    /// Selected variant.
    pub variant_id: String,
    /// Display name of the selected variant.
    pub variant_name: String,
    /// Payload of the selected variant.
    pub payload: P,
    /// Why this variant was selected.
    pub reason: AssignmentReason,
}

impl<P> Resolution<P> {
    pub(crate) fn new(variant: Variant<P>, reason: AssignmentReason) -> Self {
        Resolution {
            variant_id: variant.id,
            variant_name: variant.name,
            payload: variant.payload,
            reason,
        }
    }

    /// Whether the control variant was selected.
    pub fn is_control(&self) -> bool {
        self.variant_id == CONTROL_VARIANT_ID
    }
}

#[cfg(test)]
mod tests {
    use super::Variant;

    fn variant(id: &str, traffic_percentage: f64) -> Variant<()> {
        Variant {
            id: id.to_owned(),
            name: id.to_owned(),
            traffic_percentage,
            payload: (),
        }
    }

    #[test]
    fn control_takes_remainder() {
        let control = Variant::control(&[variant("a", 20.0), variant("b", 30.0)], ());
        assert!(control.is_control());
        assert_eq!(control.traffic_percentage, 50.0);
    }

    #[test]
    fn control_floors_at_zero() {
        let control = Variant::control(&[variant("a", 80.0), variant("b", 70.0)], ());
        assert_eq!(control.traffic_percentage, 0.0);
    }

    #[test]
    fn invalid_weights_count_as_zero() {
        assert_eq!(variant("a", -10.0).weight(), 0.0);
        assert_eq!(variant("a", f64::NAN).weight(), 0.0);
        assert_eq!(variant("a", f64::INFINITY).weight(), 0.0);
        assert_eq!(variant("a", 12.5).weight(), 12.5);
    }
}
