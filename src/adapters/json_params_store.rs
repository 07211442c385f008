//! Best-parameters document stored as pretty-printed JSON.

use crate::domain::document::BestParamsDocument;
use crate::domain::error::ShortTraderError;
use crate::ports::params_store::ParamsStore;
use std::fs;
use std::path::PathBuf;
use tracing::info;

pub struct JsonParamsStore {
    path: PathBuf,
}

impl JsonParamsStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn params_error(&self, reason: impl ToString) -> ShortTraderError {
        ShortTraderError::Params {
            path: self.path.display().to_string(),
            reason: reason.to_string(),
        }
    }
}

impl ParamsStore for JsonParamsStore {
    fn save(&self, document: &BestParamsDocument) -> Result<(), ShortTraderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(document)?;
        fs::write(&self.path, json)?;
        info!(path = %self.path.display(), "saved best parameters");
        Ok(())
    }

    fn load(&self) -> Result<BestParamsDocument, ShortTraderError> {
        let content = fs::read_to_string(&self.path).map_err(|e| self.params_error(e))?;
        serde_json::from_str(&content).map_err(|e| self.params_error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::backtest::TraderConfig;
    use crate::domain::metrics::BacktestMetrics;
    use crate::domain::strategy::StrategyParams;
    use tempfile::TempDir;

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let store = JsonParamsStore::new(dir.path().join("nested").join("best_params.json"));
        let params = StrategyParams {
            sma_period: 20,
            use_signal: false,
            ..Default::default()
        };
        let doc = BestParamsDocument::new(&TraderConfig::default(), params, &BacktestMetrics::zeroed(1000.0));

        store.save(&doc).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded.params, params);
        assert_eq!(loaded.symbol, "BTCUSDT");
        assert_eq!(loaded.results, doc.results);
    }

    #[test]
    fn missing_file_is_params_error() {
        let dir = TempDir::new().unwrap();
        let store = JsonParamsStore::new(dir.path().join("absent.json"));
        assert!(matches!(store.load(), Err(ShortTraderError::Params { .. })));
    }

    #[test]
    fn incomplete_params_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("best.json");
        fs::write(&path, r#"{"symbol": "BTCUSDT", "params": {"sma_period": 20}}"#).unwrap();
        let store = JsonParamsStore::new(path);
        assert!(matches!(store.load(), Err(ShortTraderError::Params { .. })));
    }
}
