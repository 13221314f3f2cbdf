use std::collections::{HashMap, HashSet};

use crate::error::ValidationError;
use super::model::{AnalysisResult, ModuleId, NO_SYMBOL};

#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// First error, if any
    pub fn into_result(self) -> std::result::Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Checks the internal consistency of a finished analysis
pub struct ResultValidator;

impl ResultValidator {
    pub fn validate(result: &AnalysisResult) -> ValidationResult {
        let mut errors = Vec::new();
        let mut seen_ids: HashMap<ModuleId, &str> = HashMap::new();

        for (path, module) in &result.modules {
            if module.id == 0 {
                errors.push(ValidationError::NonPositiveModuleId {
                    id: module.id,
                    path: path.clone(),
                });
            }
            if let Some(first) = seen_ids.insert(module.id, path) {
                errors.push(ValidationError::DuplicateModuleId {
                    id: module.id,
                    first: first.to_string(),
                    second: path.clone(),
                });
            }

            let mut symbol_ids = HashSet::new();
            for symbol in &module.symbols {
                if !symbol_ids.insert(symbol.id) {
                    errors.push(ValidationError::DuplicateSymbolId {
                        path: path.clone(),
                        symbol: symbol.id,
                    });
                }
                if symbol.module_id != module.id {
                    errors.push(ValidationError::ForeignSymbol {
                        path: path.clone(),
                        symbol: symbol.id,
                        claimed: symbol.module_id,
                    });
                }
            }
        }

        let by_id = result.id_table();
        for (path, module) in &result.modules {
            for edge in &module.calls {
                if module.symbol(edge.caller).is_none() {
                    errors.push(ValidationError::UnknownCaller {
                        path: path.clone(),
                        caller: edge.caller,
                    });
                }

                let Some(target) = by_id.get(&edge.target_module) else {
                    errors.push(ValidationError::UnknownTargetModule {
                        path: path.clone(),
                        module: edge.target_module,
                    });
                    continue;
                };
                if edge.target_symbol == NO_SYMBOL {
                    continue;
                }
                match target.symbol(edge.target_symbol) {
                    None => errors.push(ValidationError::UnknownTargetSymbol {
                        path: path.clone(),
                        module: edge.target_module,
                        symbol: edge.target_symbol,
                    }),
                    Some(symbol) if symbol.is_property() => {
                        errors.push(ValidationError::PropertyTarget {
                            path: path.clone(),
                            module: edge.target_module,
                            symbol: edge.target_symbol,
                        })
                    }
                    Some(_) => {}
                }
            }
        }

        ValidationResult { errors }
    }
}
