use crate::core::vision::VisionClient;
use crate::domain::model::{FunctionCall, FunctionSpec};
use crate::utils::error::{CrewError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// 可被模型以 function_call 呼叫的函式
#[async_trait]
pub trait CrewFunction: Send + Sync {
    fn spec(&self) -> FunctionSpec;
    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value>;
}

#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, Arc<dyn CrewFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: Arc<dyn CrewFunction>) {
        let name = function.spec().name;
        tracing::debug!("Registering function {}", name);
        self.functions.insert(name, function);
    }

    pub fn specs(&self) -> Vec<FunctionSpec> {
        self.functions.values().map(|f| f.spec()).collect()
    }

    pub async fn execute(&self, call: &FunctionCall) -> Result<serde_json::Value> {
        let function = self
            .functions
            .get(&call.name)
            .ok_or_else(|| CrewError::ExecutionError {
                message: format!("Function {} not found", call.name),
            })?;

        let arguments: serde_json::Value = if call.arguments.trim().is_empty() {
            serde_json::json!({})
        } else {
            serde_json::from_str(&call.arguments).map_err(|e| CrewError::ValidationError {
                message: format!("Arguments of {} are not valid JSON: {}", call.name, e),
            })?
        };

        function.call(arguments).await
    }
}

#[derive(Debug, Deserialize)]
struct SendImageArgs {
    image_path: String,
}

/// `send_image_to_api(image_path)`：把圖片送到 vision 端點
pub struct SendImageToApi {
    client: Arc<VisionClient>,
}

impl SendImageToApi {
    pub const NAME: &'static str = "send_image_to_api";

    pub fn new(client: Arc<VisionClient>) -> Self {
        Self { client }
    }

    pub fn function_spec() -> FunctionSpec {
        FunctionSpec {
            name: Self::NAME.to_string(),
            description: "Gets image path and sends it to the API.".to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    "image_path": {
                        "type": "string",
                        "description": "Valid path.",
                    }
                },
                "required": ["image_path"],
            }),
        }
    }
}

#[async_trait]
impl CrewFunction for SendImageToApi {
    fn spec(&self) -> FunctionSpec {
        Self::function_spec()
    }

    async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
        let args: SendImageArgs =
            serde_json::from_value(arguments).map_err(|e| CrewError::ValidationError {
                message: format!("{} expects {{\"image_path\": string}}: {}", Self::NAME, e),
            })?;

        self.client.send_image(Path::new(&args.image_path), None).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl CrewFunction for Echo {
        fn spec(&self) -> FunctionSpec {
            FunctionSpec {
                name: "echo".to_string(),
                description: "Returns its arguments.".to_string(),
                parameters: serde_json::json!({"type": "object"}),
            }
        }

        async fn call(&self, arguments: serde_json::Value) -> Result<serde_json::Value> {
            Ok(arguments)
        }
    }

    fn call(name: &str, arguments: &str) -> FunctionCall {
        FunctionCall {
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    #[tokio::test]
    async fn test_execute_registered_function() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Echo));

        let result = registry.execute(&call("echo", r#"{"x": 1}"#)).await.unwrap();
        assert_eq!(result, serde_json::json!({"x": 1}));
        assert_eq!(registry.specs()[0].name, "echo");
    }

    #[tokio::test]
    async fn test_unknown_function() {
        let registry = FunctionRegistry::new();
        let err = registry.execute(&call("missing", "{}")).await.unwrap_err();
        assert!(matches!(err, CrewError::ExecutionError { .. }));
    }

    #[tokio::test]
    async fn test_malformed_arguments() {
        let mut registry = FunctionRegistry::new();
        registry.register(Arc::new(Echo));

        let err = registry.execute(&call("echo", "{oops")).await.unwrap_err();
        assert!(matches!(err, CrewError::ValidationError { .. }));
    }

    #[test]
    fn test_send_image_spec() {
        let spec = SendImageToApi::function_spec();
        assert_eq!(spec.name, "send_image_to_api");
        assert_eq!(spec.parameters["required"], serde_json::json!(["image_path"]));
        assert_eq!(spec.parameters["properties"]["image_path"]["type"], "string");
    }
}
