//! Persistence port for the best-parameters document.

use crate::domain::document::BestParamsDocument;
use crate::domain::error::ShortTraderError;

pub trait ParamsStore {
    fn save(&self, document: &BestParamsDocument) -> Result<(), ShortTraderError>;
    fn load(&self) -> Result<BestParamsDocument, ShortTraderError>;
}
