//! Render parameters and the work order submitted to remote compute.

use serde::{Deserialize, Serialize};

use crate::AssetBundle;

/// Default output resolution (vertical 9:16)
pub const DEFAULT_RESOLUTION: &str = "1080x1920";
/// Default frame rate
pub const DEFAULT_FPS: u32 = 30;
/// Default video codec (NVENC H.264 on the GPU worker)
pub const DEFAULT_CODEC: &str = "h264_nvenc";

/// Render parameters as sent by the caller; every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderParamsRequest {
    #[serde(default)]
    pub resolution: Option<String>,
    #[serde(default)]
    pub fps: Option<u32>,
    #[serde(default)]
    pub codec: Option<String>,
}

impl RenderParamsRequest {
    /// Fill missing (or empty) fields with the documented defaults.
    pub fn resolve(self) -> RenderParams {
        let defaults = RenderParams::default();
        RenderParams {
            resolution: self
                .resolution
                .filter(|r| !r.is_empty())
                .unwrap_or(defaults.resolution),
            fps: self.fps.filter(|f| *f > 0).unwrap_or(defaults.fps),
            codec: self
                .codec
                .filter(|c| !c.is_empty())
                .unwrap_or(defaults.codec),
        }
    }
}

/// Fully resolved render parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderParams {
    pub resolution: String,
    pub fps: u32,
    pub codec: String,
}

impl Default for RenderParams {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION.to_string(),
            fps: DEFAULT_FPS,
            codec: DEFAULT_CODEC.to_string(),
        }
    }
}

/// Where the worker uploads the result, and where it will be readable afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputTarget {
    /// Write grant for the output object
    pub put_url: String,
    /// Public URL of the output once uploaded
    pub public_url: String,
}

/// Self-contained render request for the remote worker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkOrder {
    pub job_id: String,
    pub channel: String,
    pub inputs: AssetBundle,
    pub params: RenderParams,
    pub output: OutputTarget,
    /// Worker POSTs `{percent, message}` here while rendering
    pub progress_url: String,
    /// Worker POSTs the completion/failure notification here
    pub orchestrator_callback: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults() {
        let params = RenderParamsRequest::default().resolve();
        assert_eq!(params.resolution, "1080x1920");
        assert_eq!(params.fps, 30);
        assert_eq!(params.codec, "h264_nvenc");
    }

    #[test]
    fn test_params_partial_override() {
        let request: RenderParamsRequest =
            serde_json::from_str(r#"{"fps": 60, "codec": ""}"#).unwrap();
        let params = request.resolve();
        assert_eq!(params.resolution, DEFAULT_RESOLUTION);
        assert_eq!(params.fps, 60);
        assert_eq!(params.codec, DEFAULT_CODEC);
    }

    #[test]
    fn test_work_order_wire_shape() {
        let order = WorkOrder {
            job_id: "job-1".into(),
            channel: "Demo".into(),
            inputs: AssetBundle {
                frames: vec!["f1".into()],
                ..Default::default()
            },
            params: RenderParams::default(),
            output: OutputTarget {
                put_url: "put".into(),
                public_url: "pub".into(),
            },
            progress_url: "http://orch/jobs/job-1/progress".into(),
            orchestrator_callback: "http://orch/internal/callback".into(),
        };
        let value = serde_json::to_value(&order).unwrap();
        assert_eq!(value["inputs"]["frames"][0], "f1");
        assert_eq!(value["params"]["fps"], 30);
        assert_eq!(value["output"]["put_url"], "put");
        assert_eq!(value["orchestrator_callback"], "http://orch/internal/callback");
    }
}
