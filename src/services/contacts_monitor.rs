//! Value trigger contacts monitor
//!
//! One row per contact attached to a company value trigger in the window,
//! with the position of the contact's current role in their experience.

use super::day_bucket::Window;
use crate::db::{AttributeFilter, RecordId, RecordStore, StoreRecord};
use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContactsMonitorConfig {
    pub triggers_collection: String,
    pub contacts_field: String,
    pub company_field: String,
    pub title_field: String,
    pub companies_collection: String,
    pub company_name_field: String,
    pub contacts_collection: String,
    /// List of `{position_title, order_in_profile}` on the contact record
    pub experience_field: String,
}

impl Default for ContactsMonitorConfig {
    fn default() -> Self {
        Self {
            triggers_collection: "companyvaluetriggers".to_string(),
            contacts_field: "vt_contacts".to_string(),
            company_field: "company_id".to_string(),
            title_field: "vt_title".to_string(),
            companies_collection: "companies".to_string(),
            company_name_field: "name".to_string(),
            contacts_collection: "contacts".to_string(),
            experience_field: "coresignal_data.experience".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ContactRow {
    pub vt_id: String,
    pub company_id: String,
    pub company_name: String,
    pub vt_title: Value,
    pub contact_name: Value,
    pub contact_email: Value,
    pub contact_linkedin_url: String,
    pub contact_id: String,
    pub contact_role: String,
    /// `order_in_profile` of the experience matching the current role, else 1
    pub experience_order: Value,
}

/// Trigger fields shared by every contact row it expands into
struct TriggerContext<'a> {
    vt_id: &'a RecordId,
    company_id: &'a RecordId,
    company_name: &'a str,
    vt_title: &'a Value,
}

/// Why a single contact was left out
#[derive(Debug, PartialEq, thiserror::Error)]
enum ContactSkip {
    #[error("missing field '{0}'")]
    MissingField(&'static str),
    #[error("contact {0} not found")]
    UnknownContact(RecordId),
    #[error("contact {0} has no experience list")]
    NoExperience(RecordId),
}

/// Contacts monitor service
pub struct ContactsMonitorService;

impl ContactsMonitorService {
    /// Contact rows for value triggers created inside `window`, sorted by
    /// contact id. Contacts that cannot be resolved are skipped.
    pub async fn contact_stats(
        store: &dyn RecordStore,
        config: &ContactsMonitorConfig,
        window: &Window,
    ) -> Result<Vec<ContactRow>> {
        info!(
            "ContactsMonitorService::contact_stats - period={} collection={}",
            window.days(),
            config.triggers_collection
        );

        let range = window.time_range();
        let mut triggers: Vec<StoreRecord> = store
            .query(&config.triggers_collection, &AttributeFilter::new(), &range)
            .await?
            .into_iter()
            .filter(|t| !contacts_of(t, config).is_empty())
            .collect();
        // Newest first, then the stable sort by contact id keeps that order
        triggers.reverse();

        let company_ids: Vec<RecordId> = triggers
            .iter()
            .filter_map(|t| t.attribute_id(&config.company_field))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let contact_ids: Vec<RecordId> = triggers
            .iter()
            .flat_map(|t| contacts_of(t, config))
            .filter_map(|c| c.get("contact_id").and_then(RecordId::from_value))
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let (company_rows, contact_rows) = tokio::try_join!(
            store.find_by_ids(&config.companies_collection, &company_ids),
            store.find_by_ids(&config.contacts_collection, &contact_ids)
        )?;

        let companies: HashMap<&RecordId, &str> = company_rows
            .iter()
            .map(|c| {
                let name = c.attribute_str(&config.company_name_field).unwrap_or_default();
                (&c.id, name)
            })
            .collect();
        let contacts: HashMap<&RecordId, &StoreRecord> =
            contact_rows.iter().map(|c| (&c.id, c)).collect();

        let mut rows = Vec::new();
        let mut skipped = 0usize;
        for trigger in &triggers {
            let Some(company_id) = trigger.attribute_id(&config.company_field) else {
                continue;
            };
            let Some(&company_name) = companies.get(&company_id) else {
                debug!("Trigger {} has no company {}", trigger.id, company_id);
                continue;
            };
            let Some(vt_title) = trigger.attribute(&config.title_field) else {
                warn!("Trigger {} has no {}", trigger.id, config.title_field);
                skipped += contacts_of(trigger, config).len();
                continue;
            };

            let context = TriggerContext {
                vt_id: &trigger.id,
                company_id: &company_id,
                company_name,
                vt_title,
            };
            for contact in contacts_of(trigger, config) {
                match contact_row(&context, contact, &contacts, config) {
                    Ok(row) => rows.push(row),
                    Err(reason) => {
                        warn!("Skipping contact of trigger {}: {}", trigger.id, reason);
                        skipped += 1;
                    }
                }
            }
        }

        rows.sort_by(|a, b| a.contact_id.cmp(&b.contact_id));

        info!(
            "{} contact rows from {} triggers ({} skipped)",
            rows.len(),
            triggers.len(),
            skipped
        );

        Ok(rows)
    }
}

fn contacts_of<'a>(trigger: &'a StoreRecord, config: &ContactsMonitorConfig) -> &'a [Value] {
    trigger
        .attribute(&config.contacts_field)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default()
}

fn text_or_empty(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

fn contact_row(
    context: &TriggerContext<'_>,
    contact: &Value,
    contacts: &HashMap<&RecordId, &StoreRecord>,
    config: &ContactsMonitorConfig,
) -> std::result::Result<ContactRow, ContactSkip> {
    let field = |name: &'static str| contact.get(name).ok_or(ContactSkip::MissingField(name));

    let name = field("name")?;
    let email = field("email")?;
    let linkedin_url = field("linkedin_url")?;
    let role = field("current_role")?;
    let contact_id =
        RecordId::from_value(field("contact_id")?).ok_or(ContactSkip::MissingField("contact_id"))?;

    let record = contacts
        .get(&contact_id)
        .ok_or_else(|| ContactSkip::UnknownContact(contact_id.clone()))?;
    let experience = record
        .attribute(&config.experience_field)
        .and_then(Value::as_array)
        .ok_or_else(|| ContactSkip::NoExperience(contact_id.clone()))?;

    let experience_order = experience
        .iter()
        .find(|e| e.get("position_title") == Some(role))
        .and_then(|e| e.get("order_in_profile"))
        .cloned()
        .unwrap_or_else(|| Value::from(1));

    Ok(ContactRow {
        vt_id: context.vt_id.to_string(),
        company_id: context.company_id.to_string(),
        company_name: context.company_name.to_string(),
        vt_title: context.vt_title.clone(),
        contact_name: name.clone(),
        contact_email: email.clone(),
        contact_linkedin_url: text_or_empty(linkedin_url),
        contact_id: contact_id.to_string(),
        contact_role: text_or_empty(role),
        experience_order,
    })
}
