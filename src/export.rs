// src/export.rs
use crate::config::OutputConfig;
use crate::errors::Result;
use crate::models::{BusinessRecord, SocialPlatform};
use chrono::Utc;
use serde::Serialize;
use std::io::Write;
use tracing::info;

#[derive(Debug, Serialize)]
pub struct ExportedResults<'a> {
    pub session_id: &'a str,
    pub exported_at: String,
    pub total_records: usize,
    pub records: &'a [BusinessRecord],
}

/// Renders a session's record set to files under the output directory.
/// The core treats this as the serialization boundary; nothing upstream
/// depends on the formats chosen here.
pub struct ResultExporter {
    output: OutputConfig,
}

impl ResultExporter {
    pub fn new(output: OutputConfig) -> Self {
        Self { output }
    }

    pub async fn save_json(
        &self,
        session_id: &str,
        records: &[BusinessRecord],
    ) -> Result<String> {
        let data = ExportedResults {
            session_id,
            exported_at: Utc::now().to_rfc3339(),
            total_records: records.len(),
            records,
        };
        let json = if self.output.pretty_json {
            serde_json::to_string_pretty(&data)?
        } else {
            serde_json::to_string(&data)?
        };

        let filename = self.timestamped(session_id, "json");
        tokio::fs::create_dir_all(&self.output.directory).await?;
        tokio::fs::write(&filename, json).await?;
        info!(file = filename.as_str(), records = records.len(), "Exported JSON");
        Ok(filename)
    }

    pub fn save_csv(&self, session_id: &str, records: &[BusinessRecord]) -> Result<String> {
        let filename = self.timestamped(session_id, "csv");
        std::fs::create_dir_all(&self.output.directory)?;
        let mut file = std::fs::File::create(&filename)?;

        writeln!(
            file,
            "name,address,city,state,category,price_range,rating,reviews_count,opening_hours,\
             closure_status,place_id,maps_url,website,search_query,location_code,maps_email,\
             website_email,facebook_email,final_email,source,phones,facebook,instagram,twitter,\
             linkedin,status"
        )?;

        for record in records {
            let contact = &record.contact;
            let social = |platform: SocialPlatform| {
                contact.socials.get(&platform).cloned().unwrap_or_default()
            };
            let source = contact
                .source
                .map(|s| format!("{s:?}"))
                .unwrap_or_default();

            let fields = [
                record.name.clone(),
                record.address.clone(),
                record.city.clone(),
                record.state.clone(),
                record.category.clone(),
                record.price_range.clone(),
                record.rating.clone(),
                record.reviews_count.clone(),
                record.opening_hours.clone(),
                record.closure_status.to_string(),
                record.place_id.clone(),
                record.maps_url.clone(),
                record.website.clone(),
                record.search_query.clone(),
                record.location_code.clone(),
                contact.maps_email.clone(),
                contact.website_email.clone(),
                contact.facebook_email.clone(),
                contact.final_email.clone(),
                source,
                contact.phones.join("; "),
                social(SocialPlatform::Facebook),
                social(SocialPlatform::Instagram),
                social(SocialPlatform::Twitter),
                social(SocialPlatform::LinkedIn),
                record.status.to_string(),
            ];
            let row: Vec<String> = fields.iter().map(|f| csv_field(f)).collect();
            writeln!(file, "{}", row.join(","))?;
        }

        info!(file = filename.as_str(), records = records.len(), "Exported CSV");
        Ok(filename)
    }

    fn timestamped(&self, session_id: &str, extension: &str) -> String {
        format!(
            "{}/leads_{}_{}.{}",
            self.output.directory.trim_end_matches('/'),
            session_id,
            Utc::now().format("%Y%m%d_%H%M%S"),
            extension
        )
    }
}

/// Addresses and hours carry commas, so quote where needed.
fn csv_field(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DiscoveredReference, RecordStatus};

    fn record() -> BusinessRecord {
        let reference = DiscoveredReference {
            url: "https://maps/place/joe".to_string(),
            query: "plumber 10001".to_string(),
            location_code: "10001".to_string(),
        };
        let mut record = BusinessRecord::failed(&reference, "unused");
        record.name = "Joe's Plumbing".to_string();
        record.address = "1 Main St, Springfield, IL 62704".to_string();
        record.status = RecordStatus::Scraped;
        record
    }

    fn exporter() -> ResultExporter {
        ResultExporter::new(OutputConfig {
            directory: std::env::temp_dir()
                .join(format!("maps-lead-export-{}", uuid::Uuid::new_v4()))
                .to_string_lossy()
                .to_string(),
            pretty_json: true,
        })
    }

    #[tokio::test]
    async fn json_export_round_trips_the_record_list() {
        let path = exporter().save_json("s1", &[record()]).await.unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value["total_records"], 1);
        assert_eq!(value["records"][0]["name"], "Joe's Plumbing");
        assert_eq!(value["records"][0]["status"], "SCRAPED");
    }

    #[tokio::test]
    async fn csv_export_quotes_fields_with_commas() {
        let path = exporter().save_csv("s1", &[record()]).unwrap();
        let content = tokio::fs::read_to_string(&path).await.unwrap();
        let mut lines = content.lines();
        assert!(lines.next().unwrap().starts_with("name,address,city"));
        let row = lines.next().unwrap();
        assert!(row.contains("\"1 Main St, Springfield, IL 62704\""));
        assert!(row.ends_with("SCRAPED"));
    }

    #[test]
    fn csv_field_escapes_quotes() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }
}
