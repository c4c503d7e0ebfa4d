//! Service configuration from flags and environment

use std::path::PathBuf;

use clap::Parser;

use farmwise_core::{ModelBackend, DEFAULT_ASSETS_DIR, DEFAULT_CONFIDENCE_THRESHOLD};

/// Command-line arguments for farmwise-api
#[derive(Parser, Debug, Clone)]
#[command(name = "farmwise-api")]
#[command(about = "FarmWise plant disease detection service")]
#[command(version)]
pub struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "5000", env = "PORT")]
    pub port: u16,

    /// Directory holding the model and lookup tables
    #[arg(long, default_value = DEFAULT_ASSETS_DIR, env = "FARMWISE_ASSETS_DIR")]
    pub assets_dir: PathBuf,

    /// Inference backend: "tflite" (quantized, light) or "onnx" (full precision)
    #[arg(long, default_value = "tflite", env = "FARMWISE_BACKEND")]
    pub backend: ModelBackend,

    /// Report "uncertain" below this top-1 probability
    #[arg(
        long,
        default_value_t = DEFAULT_CONFIDENCE_THRESHOLD,
        env = "FARMWISE_CONFIDENCE_THRESHOLD"
    )]
    pub confidence_threshold: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Clear every variable Args reads; these tests share process env.
    fn clear_env() {
        for key in [
            "PORT",
            "FARMWISE_ASSETS_DIR",
            "FARMWISE_BACKEND",
            "FARMWISE_CONFIDENCE_THRESHOLD",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial_test::serial]
    fn defaults_match_the_deployed_service() {
        clear_env();
        let args = Args::parse_from(["farmwise-api"]);
        assert_eq!(args.port, 5000);
        assert_eq!(args.assets_dir, PathBuf::from("assets"));
        assert_eq!(args.backend, ModelBackend::Tflite);
        assert_eq!(args.confidence_threshold, 0.70);
    }

    #[test]
    #[serial_test::serial]
    fn backend_flag_selects_onnx() {
        clear_env();
        let args = Args::parse_from(["farmwise-api", "--backend", "onnx", "--port", "8080"]);
        assert_eq!(args.backend, ModelBackend::Onnx);
        assert_eq!(args.port, 8080);
    }

    #[test]
    #[serial_test::serial]
    fn env_vars_stand_in_for_flags() {
        clear_env();
        std::env::set_var("PORT", "9100");
        std::env::set_var("FARMWISE_BACKEND", "onnx");
        let args = Args::parse_from(["farmwise-api"]);
        clear_env();
        assert_eq!(args.port, 9100);
        assert_eq!(args.backend, ModelBackend::Onnx);
        assert_eq!(args.assets_dir, PathBuf::from("assets"));
    }
}
