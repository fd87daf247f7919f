use regstep_chain::PersistedEntity;
use serde_json::Value;

/// A persisted entity whose stored columns can be inspected after the chain ran.
pub trait StepEntity: PersistedEntity + Send + Sync {
    /// Stored value of `column`, if the entity has one.
    fn attribute(&self, column: &str) -> Option<&Value>;

    /// Registration progress marker carried by the primary entity.
    ///
    /// Returns `None` for entities that do not track progress.
    fn progress(&self) -> Option<Value> {
        None
    }
}
