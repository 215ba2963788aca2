//! State schema and reducers
//!
//! The graph state is a JSON object whose keys are *channels*. Nodes never
//! replace the state wholesale; they return a partial update and the
//! [`StateSchema`] folds that update into the current state one channel at a
//! time, using the channel's [`Reducer`].
//!
//! | Reducer | Behavior | Use Case |
//! |---------|----------|----------|
//! | [`OverwriteReducer`] | Last write wins (default) | Status flags, scalars |
//! | [`AppendReducer`] | Concatenate arrays | Message history, logs |
//! | [`FnReducer`] | Caller-supplied function | Counters, custom merges |
//!
//! Channels that are not declared in the schema use overwrite semantics, so a
//! schema can be as small as the one channel that needs special merging.
//!
//! # Example
//!
//! ```rust
//! use flowstate_core::state::{AppendReducer, FnReducer, StateSchema};
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! let mut schema = StateSchema::new();
//! schema.add_field("messages", Arc::new(AppendReducer));
//! schema.add_field_with_default(
//!     "count",
//!     Arc::new(FnReducer::new("sum", |a, b| {
//!         json!(a.as_i64().unwrap_or(0) + b.as_i64().unwrap_or(0))
//!     })),
//!     json!(0),
//! );
//!
//! let mut state = schema.initial_state();
//! let update = json!({"messages": ["hi"], "count": 2, "topic": "rust"});
//! schema.apply(&mut state, update.as_object().unwrap()).unwrap();
//!
//! assert_eq!(state["messages"], json!(["hi"]));
//! assert_eq!(state["count"], json!(2));
//! assert_eq!(state["topic"], json!("rust"));
//! ```

use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// The shared state flowing through a graph
pub type State = flowstate_checkpoint::ChannelValues;

/// A partial state returned by a node
pub type StateUpdate = serde_json::Map<String, Value>;

#[derive(Debug, Error)]
pub enum StateError {
    /// Reducer encountered incompatible types
    #[error("Reducer '{reducer}' failed on channel '{channel}': {message}")]
    ReducerError {
        channel: String,
        reducer: String,
        message: String,
    },
}

pub type Result<T> = std::result::Result<T, StateError>;

/// Combines the current value of a channel with an incoming write
pub trait Reducer: Send + Sync {
    /// `current` is `Value::Null` when the channel has never been written
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String>;

    fn name(&self) -> &str;
}

/// Replaces the current value with the update
#[derive(Debug, Clone, Copy, Default)]
pub struct OverwriteReducer;

impl Reducer for OverwriteReducer {
    fn reduce(&self, _current: &Value, update: &Value) -> std::result::Result<Value, String> {
        Ok(update.clone())
    }

    fn name(&self) -> &str {
        "overwrite"
    }
}

/// Appends the update to the current array
///
/// - **Array + Array**: concatenates
/// - **Array + Scalar**: pushes the scalar as one element
/// - **Null + anything**: starts a new array
///
/// A current value that is not an array is an error.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppendReducer;

impl Reducer for AppendReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        let mut items = match current {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => return Err(format!("current value is not an array: {}", other)),
        };
        match update {
            Value::Array(new_items) => items.extend(new_items.iter().cloned()),
            single => items.push(single.clone()),
        }
        Ok(Value::Array(items))
    }

    fn name(&self) -> &str {
        "append"
    }
}

/// Reducer backed by a plain function
#[derive(Clone)]
pub struct FnReducer {
    name: String,
    func: Arc<dyn Fn(&Value, &Value) -> Value + Send + Sync>,
}

impl FnReducer {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&Value, &Value) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            func: Arc::new(func),
        }
    }
}

impl fmt::Debug for FnReducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnReducer").field("name", &self.name).finish()
    }
}

impl Reducer for FnReducer {
    fn reduce(&self, current: &Value, update: &Value) -> std::result::Result<Value, String> {
        Ok((self.func)(current, update))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// A declared channel: its reducer and the value it starts with
#[derive(Clone)]
pub struct ChannelSpec {
    pub name: String,
    pub reducer: Arc<dyn Reducer>,
    pub default: Option<Value>,
}

impl fmt::Debug for ChannelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChannelSpec")
            .field("name", &self.name)
            .field("reducer", &self.reducer.name())
            .field("default", &self.default)
            .finish()
    }
}

/// Declared channels of a graph and how updates merge into them
#[derive(Clone, Debug, Default)]
pub struct StateSchema {
    fields: HashMap<String, ChannelSpec>,
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a channel with no default value
    pub fn add_field(&mut self, name: impl Into<String>, reducer: Arc<dyn Reducer>) -> &mut Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            ChannelSpec {
                name,
                reducer,
                default: None,
            },
        );
        self
    }

    /// Declare a channel that is present in the state before the first write
    pub fn add_field_with_default(
        &mut self,
        name: impl Into<String>,
        reducer: Arc<dyn Reducer>,
        default: Value,
    ) -> &mut Self {
        let name = name.into();
        self.fields.insert(
            name.clone(),
            ChannelSpec {
                name,
                reducer,
                default: Some(default),
            },
        );
        self
    }

    pub fn field(&self, name: &str) -> Option<&ChannelSpec> {
        self.fields.get(name)
    }

    /// Declared channel names, sorted
    pub fn fields(&self) -> Vec<String> {
        let mut names: Vec<String> = self.fields.keys().cloned().collect();
        names.sort();
        names
    }

    /// Name of the reducer used for `channel` (undeclared channels overwrite)
    pub fn reducer_name(&self, channel: &str) -> &str {
        self.fields
            .get(channel)
            .map(|spec| spec.reducer.name())
            .unwrap_or("overwrite")
    }

    /// State of a fresh thread: every channel that declares a default
    pub fn initial_state(&self) -> State {
        let mut state = State::new();
        for spec in self.fields.values() {
            if let Some(default) = &spec.default {
                state.insert(spec.name.clone(), default.clone());
            }
        }
        state
    }

    /// Fold `update` into `state` channel by channel.
    ///
    /// The state is left untouched when any channel fails to reduce.
    pub fn apply(&self, state: &mut State, update: &StateUpdate) -> Result<()> {
        let mut reduced = Vec::with_capacity(update.len());
        for (channel, value) in update {
            let next = match self.fields.get(channel) {
                Some(spec) => {
                    let current = state.get(channel).unwrap_or(&Value::Null);
                    spec.reducer
                        .reduce(current, value)
                        .map_err(|message| StateError::ReducerError {
                            channel: channel.clone(),
                            reducer: spec.reducer.name().to_string(),
                            message,
                        })?
                }
                None => value.clone(),
            };
            reduced.push((channel.clone(), next));
        }

        for (channel, value) in reduced {
            state.insert(channel, value);
        }
        Ok(())
    }

    /// Non-mutating variant of [`apply`](Self::apply)
    pub fn merge(&self, state: &State, update: &StateUpdate) -> Result<State> {
        let mut next = state.clone();
        self.apply(&mut next, update)?;
        Ok(next)
    }
}
