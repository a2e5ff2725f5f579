//! Load phase of `run_multi`: fan out reads, join them, keep input order.

use crate::error::{ContextError, Result};
use crate::loader::{SourceItem, SourceLoader};
use tokio::task::JoinSet;

/// Script text ready to execute, in batch order.
#[derive(Debug)]
pub(crate) struct PreparedScript {
    pub label: String,
    pub source: String,
}

/// One batch per `run_multi` call. Consumed by `load`.
pub(crate) struct LoadBatch {
    items: Vec<SourceItem>,
    slots: Vec<Option<String>>,
    completed: usize,
    first_error: Option<ContextError>,
}

impl LoadBatch {
    pub(crate) fn new(items: Vec<SourceItem>) -> Self {
        let slots = vec![None; items.len()];
        Self {
            items,
            slots,
            completed: 0,
            first_error: None,
        }
    }

    /// Resolve every item. Inline sources fill their slot immediately;
    /// references load concurrently. All issued reads are awaited even after
    /// a failure, and the first failure to arrive is the one reported.
    pub(crate) async fn load(mut self, loader: &dyn SourceLoader) -> Result<Vec<PreparedScript>> {
        let mut pending = JoinSet::new();

        for (index, item) in self.items.iter().enumerate() {
            match item {
                SourceItem::Inline { source, .. } => {
                    self.slots[index] = Some(source.clone());
                    self.completed += 1;
                }
                SourceItem::Reference(reference) => {
                    tracing::debug!(index, reference = %reference, "loading script");
                    let load = loader.load(reference);
                    // Inner task so a panicking loader is still reported
                    // against its own item.
                    pending.spawn(async move {
                        let outcome = match tokio::spawn(load).await {
                            Ok(outcome) => outcome,
                            Err(join_err) => Err(anyhow::anyhow!("load task failed: {}", join_err)),
                        };
                        (index, outcome)
                    });
                }
            }
        }

        while let Some(joined) = pending.join_next().await {
            self.completed += 1;
            match joined {
                Ok((index, Ok(text))) => self.slots[index] = Some(text),
                Ok((index, Err(err))) => {
                    let reference = self.items[index].label().to_string();
                    tracing::warn!(index, reference = %reference, error = %err, "script load failed");
                    self.record(ContextError::Load {
                        reference,
                        source: err,
                    });
                }
                // The wrapper task never panics; this is runtime shutdown.
                Err(join_err) => self.record(ContextError::Runtime(format!(
                    "script loading interrupted: {}",
                    join_err
                ))),
            }
        }
        debug_assert_eq!(self.completed, self.items.len());

        if let Some(err) = self.first_error {
            return Err(err);
        }

        Ok(self
            .items
            .iter()
            .zip(self.slots)
            .map(|(item, slot)| PreparedScript {
                label: item.label().to_string(),
                source: slot.unwrap_or_default(),
            })
            .collect())
    }

    fn record(&mut self, err: ContextError) {
        if self.first_error.is_none() {
            self.first_error = Some(err);
        }
    }
}
