mod distribution;
mod marketplace;

use std::{collections::HashMap, future::Future, sync::Arc};

use futures::future::BoxFuture;
use log::{debug, trace};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use grove_common::{api::ApiResponse, error::EngineError};

use crate::core::{storage::Storage, GroveEngine};

/// Handler registered in the method table.
pub type Handler<S> = for<'a> fn(&'a GroveApi<S>, Value) -> BoxFuture<'a, ApiResponse<Value>>;

/// Wrap an `async fn(&GroveApi<S>, Value) -> ApiResponse<Value>` into a [`Handler`].
#[macro_export]
macro_rules! async_handler {
    ($func:expr) => {
        |api, body| Box::pin($func(api, body))
    };
}

/// One call of the JSON transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiRequest {
    pub method: String,
    #[serde(default)]
    pub params: Value,
}

pub fn parse_params<P: DeserializeOwned>(value: Value) -> Result<P, EngineError> {
    // Methods without parameters accept a missing body
    let value = if value.is_null() {
        Value::Object(Default::default())
    } else {
        value
    };
    serde_json::from_value(value).map_err(EngineError::from)
}

// Serialize the data of a typed response
fn to_json<T: Serialize>(response: ApiResponse<T>) -> ApiResponse<Value> {
    match response.data {
        Some(data) => match serde_json::to_value(data) {
            Ok(value) => ApiResponse::ok(value),
            Err(e) => ApiResponse::err(&EngineError::from(e)),
        },
        None => ApiResponse {
            success: response.success,
            data: None,
            error: response.error,
        },
    }
}

// Parse the params of a call and run it
async fn handle<P, T, F, Fut>(body: Value, op: F) -> ApiResponse<Value>
where
    P: DeserializeOwned,
    T: Serialize,
    F: FnOnce(P) -> Fut,
    Fut: Future<Output = ApiResponse<T>>,
{
    match parse_params(body) {
        Ok(params) => to_json(op(params).await),
        Err(e) => ApiResponse::err(&e),
    }
}

/// Operation surface of the engine.
///
/// Every operation returns an [`ApiResponse`]; engine errors never escape
/// as anything else. The method table lets a transport dispatch by name.
pub struct GroveApi<S: Storage> {
    engine: Arc<GroveEngine<S>>,
    methods: HashMap<&'static str, Handler<S>>,
}

impl<S: Storage> GroveApi<S> {
    pub fn new(engine: Arc<GroveEngine<S>>) -> Self {
        let mut api = Self {
            engine,
            methods: HashMap::new(),
        };
        distribution::register_methods(&mut api);
        marketplace::register_methods(&mut api);
        api
    }

    pub fn engine(&self) -> &Arc<GroveEngine<S>> {
        &self.engine
    }

    pub fn register_method(&mut self, name: &'static str, handler: Handler<S>) {
        if self.methods.insert(name, handler).is_some() {
            debug!("Method {} registered twice, keeping the last handler", name);
        }
    }

    /// Registered method names, sorted.
    pub fn method_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.methods.keys().copied().collect();
        names.sort_unstable();
        names
    }

    pub async fn dispatch(&self, method: &str, params: Value) -> ApiResponse<Value> {
        trace!("Dispatching {}", method);
        match self.methods.get(method) {
            Some(handler) => handler(self, params).await,
            None => ApiResponse::err(&EngineError::MethodNotFound(method.to_string())),
        }
    }

    pub async fn handle_request(&self, request: ApiRequest) -> ApiResponse<Value> {
        self.dispatch(&request.method, request.params).await
    }
}
