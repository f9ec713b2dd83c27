//! Company profile completeness monitor

use crate::db::{AttributeFilter, RecordStore, TimeRange};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

const DEFAULT_REQUIRED_FIELDS: &[&str] = &[
    "estimated_num_employees",
    "annual_revenue",
    "city",
    "state",
    "country",
    "website",
    "linkedin_url",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanyMonitorConfig {
    pub collection: String,
    pub name_field: String,
    pub filter: AttributeFilter,
    /// Fields that must be present and non-null
    pub required_fields: Vec<String>,
    /// List fields that must not be empty
    pub list_fields: Vec<String>,
}

impl Default for CompanyMonitorConfig {
    fn default() -> Self {
        Self {
            collection: "companies".to_string(),
            name_field: "name".to_string(),
            filter: AttributeFilter::new().with("status", "Active"),
            required_fields: DEFAULT_REQUIRED_FIELDS.iter().map(|f| f.to_string()).collect(),
            list_fields: vec!["primary_industries".to_string()],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStatistic {
    pub total: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncompleteProfile {
    pub id: String,
    pub name: String,
    pub missing_fields: Vec<String>,
    pub fields: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanyMonitorReport {
    pub statistic: ProfileStatistic,
    pub data: Vec<IncompleteProfile>,
}

/// Company monitor service
pub struct CompanyMonitorService;

impl CompanyMonitorService {
    /// Companies with at least one missing profile field, in fetch order
    pub async fn incomplete_profiles(
        store: &dyn RecordStore,
        config: &CompanyMonitorConfig,
    ) -> Result<CompanyMonitorReport> {
        info!(
            "CompanyMonitorService::incomplete_profiles - collection={}",
            config.collection
        );

        let companies = store
            .query(&config.collection, &config.filter, &TimeRange::all())
            .await?;

        let mut data = Vec::new();
        for company in &companies {
            let mut missing_fields = Vec::new();
            let mut fields = Map::new();

            for field in &config.required_fields {
                let value = company.attribute(field).cloned().unwrap_or(Value::Null);
                if value.is_null() {
                    missing_fields.push(field.clone());
                }
                fields.insert(field.clone(), value);
            }

            for field in &config.list_fields {
                let value = company.attribute(field).cloned().unwrap_or(Value::Null);
                if value.as_array().is_some_and(|items| items.is_empty()) {
                    missing_fields.push(field.clone());
                }
                fields.insert(field.clone(), value);
            }

            if missing_fields.is_empty() {
                continue;
            }

            data.push(IncompleteProfile {
                id: company.id.to_string(),
                name: company
                    .attribute_str(&config.name_field)
                    .unwrap_or_default()
                    .to_string(),
                missing_fields,
                fields,
            });
        }

        info!(
            "{} of {} companies have incomplete profiles",
            data.len(),
            companies.len()
        );

        Ok(CompanyMonitorReport {
            statistic: ProfileStatistic { total: data.len() },
            data,
        })
    }
}
