use crate::{
    random::RandomSource,
    storage::{SharedStorage, TestKey},
    variant::{AssignmentReason, Resolution, Variant},
};

/// Persisted, weighted-random variant selection.
///
/// The first resolution of a [`TestKey`] draws a variant and stores its id in durable storage.
/// Every later resolution returns the stored variant for as long as it remains among the
/// candidates, regardless of weight changes.
pub struct VariantSelector<'a> {
    storage: SharedStorage,
    random: Box<dyn RandomSource + Send + Sync + 'a>,
}

impl<'a> VariantSelector<'a> {
    /// Create a selector persisting assignments to `storage` and drawing from `random`.
    pub fn new(storage: SharedStorage, random: Box<dyn RandomSource + Send + Sync + 'a>) -> Self {
        Self { storage, random }
    }

    /// Resolve the variant for `test_key` among `variants` and the implicit control.
    ///
    /// When `variants` is empty no test is running: control is returned and nothing is read
    /// or persisted.
    pub fn resolve_variant<P: Clone>(
        &self,
        test_key: &TestKey,
        variants: &[Variant<P>],
        control_payload: P,
    ) -> Resolution<P> {
        let control = Variant::control(variants, control_payload);
        if variants.is_empty() {
            return Resolution::new(control, AssignmentReason::NoTest);
        }

        let mut candidates = Vec::with_capacity(variants.len() + 1);
        candidates.push(control);
        candidates.extend(variants.iter().cloned());

        let storage_key = test_key.storage_key();
        let stored = self.storage.get(&storage_key).unwrap_or_else(|err| {
            log::warn!(target: "pb_experience",
                       test_key:display = test_key;
                       "unable to read stored assignment, treating as first visit: {:?}", err);
            None
        });

        let reason = match stored {
            Some(variant_id) => {
                if let Some(index) = candidates.iter().position(|it| it.id == variant_id) {
                    log::trace!(target: "pb_experience",
                                test_key:display = test_key,
                                variant_id:display = variant_id;
                                "reusing stored assignment");
                    let variant = candidates.swap_remove(index);
                    return Resolution::new(variant, AssignmentReason::Sticky);
                }
                log::debug!(target: "pb_experience",
                            test_key:display = test_key,
                            variant_id:display = variant_id;
                            "stored variant no longer exists, reassigning");
                AssignmentReason::Reassigned
            }
            None => AssignmentReason::Assigned,
        };

        let index = self.draw(&candidates);
        let variant = candidates.swap_remove(index);

        if let Err(err) = self.storage.set(&storage_key, &variant.id) {
            log::warn!(target: "pb_experience",
                       test_key:display = test_key,
                       variant_id:display = variant.id;
                       "unable to persist assignment: {:?}", err);
        }
        log::debug!(target: "pb_experience",
                    test_key:display = test_key,
                    variant_id:display = variant.id;
                    "assigned variant");

        Resolution::new(variant, reason)
    }

    /// Pick a candidate index by weight. Zero-weight candidates are never picked; if no
    /// candidate can be picked, the first one is returned.
    fn draw<P>(&self, candidates: &[Variant<P>]) -> usize {
        let total: f64 = candidates.iter().map(Variant::weight).sum();
        if total <= 0.0 {
            return 0;
        }

        let r = self.random.next_f64() * total;
        let mut running = 0.0;
        for (index, candidate) in candidates.iter().enumerate() {
            let weight = candidate.weight();
            if weight <= 0.0 {
                continue;
            }
            running += weight;
            if running >= r {
                return index;
            }
        }

        0
    }
}
