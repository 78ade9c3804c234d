//! # Form Actions
//!
//! [`FormActions`] commits a form node through a save service. A save reads the
//! form's flattened value, calls the service and, when it succeeds, sets the
//! result into the form's source store node. The form then resyncs from the
//! store and leaves edit mode. When the service fails, the form keeps its edits.
//!
//! Concurrent saves are not coordinated: the last one to resolve wins.

use std::cell::Cell;
use std::future::Future;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::errors::{ActionError, ServiceError};
use crate::form::FormNode;
use crate::load::{ServiceFn, service_fn};
use crate::observable::{Disposer, Observable, action, untracked};

type SavedFn = Box<dyn Fn(&Value)>;

/// What happened to a save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    /// The value was committed to the store node.
    Saved(Value),
    /// The form has errors; the service was not called.
    Invalid,
    /// The actions were disposed before the service resolved.
    Discarded,
}

/// Configuration of a [`FormActions`].
pub struct FormActionsBuilder {
    form: FormNode,
    save: Option<ServiceFn>,
    on_saved: Option<SavedFn>,
}

impl FormActionsBuilder {
    /// The save service. It receives the form's value and returns the saved
    /// record, or `null` to commit the submitted value as is.
    pub fn save<F, Fut>(mut self, f: F) -> Self
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = Result<Value, ServiceError>> + 'static,
    {
        self.save = Some(service_fn(f));
        self
    }

    /// Called with the committed value after a successful save.
    pub fn on_saved(mut self, f: impl Fn(&Value) + 'static) -> Self {
        self.on_saved = Some(Box::new(f));
        self
    }

    /// Finishes the configuration.
    pub fn build(self) -> FormActions {
        FormActions(Rc::new(ActionsState {
            form: self.form,
            save: self.save,
            on_saved: self.on_saved,
            is_saving: Observable::new(false),
            disposed: Cell::new(false),
        }))
    }
}

struct ActionsState {
    form: FormNode,
    save: Option<ServiceFn>,
    on_saved: Option<SavedFn>,
    is_saving: Observable<bool>,
    disposed: Cell<bool>,
}

/// Save orchestration for one form node.
#[derive(Clone)]
pub struct FormActions(Rc<ActionsState>);

impl std::fmt::Debug for FormActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FormActions")
            .field("has_save", &self.0.save.is_some())
            .field("is_saving", &self.0.is_saving)
            .field("disposed", &self.0.disposed.get())
            .finish()
    }
}

impl FormActions {
    /// Starts the configuration for `form`.
    pub fn builder(form: &FormNode) -> FormActionsBuilder {
        FormActionsBuilder {
            form: form.clone(),
            save: None,
            on_saved: None,
        }
    }

    /// The form being saved.
    pub fn form(&self) -> &FormNode {
        &self.0.form
    }

    /// Saves the form.
    pub async fn save(&self) -> Result<SaveOutcome, ActionError> {
        let state = &self.0;
        let Some(save) = state.save.clone() else {
            return Err(ActionError::MissingService { action: "save" });
        };
        if state.disposed.get() {
            return Ok(SaveOutcome::Discarded);
        }
        let form = &state.form;
        if !untracked(|| form.is_valid()) {
            debug!(entity = ?form.entity().name(), "form has errors, save skipped");
            return Ok(SaveOutcome::Invalid);
        }

        let (payload, edits) = untracked(|| (form.to_value(), form.to_value_with_nulls()));
        debug!(entity = ?form.entity().name(), "saving");
        state.is_saving.set(true);
        let result = save(payload.clone()).await;
        state.is_saving.set(false);
        if state.disposed.get() {
            warn!(entity = ?form.entity().name(), "discarding save result after disposal");
            return Ok(SaveOutcome::Discarded);
        }
        let saved = result.map_err(|source| ActionError::Service {
            action: "save",
            source,
        })?;

        action(|| {
            form.source().set(&edits);
            if !saved.is_null() {
                form.source().set(&saved);
            }
            form.reset();
            form.set_is_edit(false);
        });
        let committed = if saved.is_null() { payload } else { saved };
        info!(entity = ?form.entity().name(), "form saved");
        if let Some(on_saved) = &state.on_saved {
            on_saved(&committed);
        }
        Ok(SaveOutcome::Saved(committed))
    }

    /// True while a save is in flight, recording the read.
    pub fn is_saving(&self) -> bool {
        self.0.is_saving.get()
    }

    /// Discards the result of any save in flight and of later ones.
    pub fn dispose(&self) {
        self.0.disposed.set(true);
        self.0.is_saving.set(false);
    }
}

impl From<FormActions> for Disposer {
    fn from(actions: FormActions) -> Self {
        Disposer::new(move || actions.dispose())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::make_form_node;
    use crate::observable::Scope;
    use crate::store::StoreNode;
    use crate::test_utils::operation_entity;
    use serde_json::json;

    fn block_on<F: Future>(future: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(future)
    }

    fn store() -> StoreNode {
        let store = StoreNode::new(&operation_entity());
        store.set(&json!({"code": "ABC", "address": {"city": "Paris"}}));
        store
    }

    #[test]
    fn invalid_forms_never_reach_the_service() {
        block_on(async {
            let scope = Scope::new();
            let store = store();
            let form = make_form_node(&scope, &store, |b| b.edit(true));
            form.field("code").unwrap().set_value(Value::Null);
            let called = Rc::new(Cell::new(false));
            let actions = FormActions::builder(&form)
                .save({
                    let called = Rc::clone(&called);
                    move |_| {
                        called.set(true);
                        async { Ok::<_, ServiceError>(Value::Null) }
                    }
                })
                .build();
            assert_eq!(actions.save().await.unwrap(), SaveOutcome::Invalid);
            assert!(!called.get());
            assert!(form.is_edit());
        });
    }

    #[test]
    fn null_results_commit_the_payload() {
        block_on(async {
            let scope = Scope::new();
            let store = store();
            let form = make_form_node(&scope, &store, |b| b.edit(true));
            form.field("libelle").unwrap().set_value("edited");
            let actions = FormActions::builder(&form)
                .save(|_| async { Ok::<_, ServiceError>(Value::Null) })
                .build();
            let outcome = actions.save().await.unwrap();
            assert!(matches!(outcome, SaveOutcome::Saved(ref v) if v["libelle"] == json!("edited")));
            assert_eq!(store.field("libelle").unwrap().value(), json!("edited"));
            assert!(!form.is_edit());
        });
    }

    #[test]
    fn cleared_fields_are_committed() {
        block_on(async {
            for result in [Value::Null, json!({"code": "ABC", "address": {"city": "Paris"}})] {
                let scope = Scope::new();
                let store = store();
                store.set(&json!({"libelle": "old"}));
                let form = make_form_node(&scope, &store, |b| b.edit(true));
                form.field("libelle").unwrap().set_value(Value::Null);
                let actions = FormActions::builder(&form)
                    .save(move |payload: Value| {
                        assert!(payload.get("libelle").is_none());
                        let result = result.clone();
                        async move { Ok::<_, ServiceError>(result) }
                    })
                    .build();
                assert!(matches!(actions.save().await.unwrap(), SaveOutcome::Saved(_)));
                assert!(store.field("libelle").unwrap().value().is_null());
                assert!(form.field("libelle").unwrap().value().is_null());
                assert_eq!(store.field("code").unwrap().value(), json!("ABC"));
            }
        });
    }

    #[test]
    fn failures_keep_the_edits() {
        block_on(async {
            let scope = Scope::new();
            let store = store();
            let form = make_form_node(&scope, &store, |b| b.edit(true));
            form.field("libelle").unwrap().set_value("edited");
            let actions = FormActions::builder(&form)
                .save(|_| async { Err::<Value, ServiceError>("conflict".into()) })
                .build();
            assert!(matches!(
                actions.save().await,
                Err(ActionError::Service { action: "save", .. })
            ));
            assert_eq!(form.field("libelle").unwrap().value(), json!("edited"));
            assert!(store.field("libelle").unwrap().value().is_null());
            assert!(form.is_edit());
            assert!(!actions.is_saving());
        });
    }

    #[test]
    fn disposed_actions_discard_results() {
        block_on(async {
            let scope = Scope::new();
            let store = store();
            let form = make_form_node(&scope, &store, |b| b.edit(true));
            form.field("libelle").unwrap().set_value("edited");
            let actions = FormActions::builder(&form)
                .save(|_| async { Ok::<_, ServiceError>(Value::Null) })
                .build();
            actions.dispose();
            assert_eq!(actions.save().await.unwrap(), SaveOutcome::Discarded);
            assert!(store.field("libelle").unwrap().value().is_null());
        });
    }
}
