use serde::{Deserialize, Serialize};

use crate::collector::{SessionReport, SessionState, TableStats, TableStatus};

/// Итог цикла опроса в JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollSummaryJson {
    pub timestamp: String,
    pub dry_run: bool,
    pub summary: CycleSummary,
    pub devices: Vec<DeviceResultJson>,
    pub errors: Vec<ErrorInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleSummary {
    pub total_devices: usize,
    pub successful_devices: usize,
    pub failed_devices: usize,
    pub records_stored: usize,
    pub records_dropped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceResultJson {
    pub device_id: i64,
    pub address: String,
    pub vendor: String,
    pub status: String, // "done" | "failed"
    pub error: Option<String>,
    pub started_at: String,
    pub elapsed_ms: u64,
    pub tables: Vec<TableResultJson>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableResultJson {
    pub kind: String,
    pub root: Option<String>,
    pub status: String, // "completed" | "skipped" | "no_response" | "protocol_error"
    pub detail: Option<String>,
    pub bindings: usize,
    pub stored: usize,
    pub dropped: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub item_type: String, // "device" | "table"
    pub device_id: i64,
    pub item_name: String,
    pub error_message: String,
}

/// JSON форматтер для результатов опроса
pub struct JsonFormatter;

impl JsonFormatter {
    pub fn format_cycle(reports: &[SessionReport], dry_run: bool) -> PollSummaryJson {
        let timestamp = chrono::Utc::now().to_rfc3339();

        let mut devices: Vec<DeviceResultJson> = reports.iter().map(Self::format_device).collect();
        devices.sort_by_key(|d| d.device_id);

        let failed_devices = reports
            .iter()
            .filter(|r| r.state == SessionState::Failed)
            .count();
        let records_dropped: usize = reports
            .iter()
            .flat_map(|r| &r.tables)
            .map(|t| t.dropped)
            .sum();

        let summary = CycleSummary {
            total_devices: reports.len(),
            successful_devices: reports.len() - failed_devices,
            failed_devices,
            records_stored: reports.iter().map(SessionReport::stored).sum(),
            records_dropped,
        };

        PollSummaryJson {
            timestamp,
            dry_run,
            summary,
            devices,
            errors: Self::extract_errors(reports),
        }
    }

    fn format_device(report: &SessionReport) -> DeviceResultJson {
        let status = match report.state {
            SessionState::Failed => "failed",
            _ => "done",
        };
        DeviceResultJson {
            device_id: report.device_id,
            address: report.address.clone(),
            vendor: report.vendor.clone(),
            status: status.to_string(),
            error: report.error.clone(),
            started_at: report.started_at.to_rfc3339(),
            elapsed_ms: report.elapsed_ms,
            tables: report.tables.iter().map(Self::format_table).collect(),
        }
    }

    fn format_table(table: &TableStats) -> TableResultJson {
        let (status, detail) = match &table.status {
            TableStatus::Skipped => ("skipped", None),
            TableStatus::Completed(reason) => ("completed", Some(reason.clone())),
            TableStatus::NoResponse => ("no_response", None),
            TableStatus::ProtocolError(reason) => ("protocol_error", Some(reason.clone())),
        };
        TableResultJson {
            kind: table.kind.to_string(),
            root: table.root.clone(),
            status: status.to_string(),
            detail,
            bindings: table.bindings,
            stored: table.stored,
            dropped: table.dropped,
        }
    }

    /// Ошибки устройств и упавшие обходы
    fn extract_errors(reports: &[SessionReport]) -> Vec<ErrorInfo> {
        let mut errors = Vec::new();

        for report in reports {
            if let Some(ref error) = report.error {
                errors.push(ErrorInfo {
                    item_type: "device".to_string(),
                    device_id: report.device_id,
                    item_name: report.address.clone(),
                    error_message: error.clone(),
                });
            }

            for table in report.tables.iter().filter(|t| t.status.is_failure()) {
                let message = match &table.status {
                    TableStatus::ProtocolError(reason) => format!("protocol error: {reason}"),
                    _ => "no response".to_string(),
                };
                errors.push(ErrorInfo {
                    item_type: "table".to_string(),
                    device_id: report.device_id,
                    item_name: table.kind.to_string(),
                    error_message: message,
                });
            }
        }

        errors
    }

    pub fn to_json_string(reports: &[SessionReport], dry_run: bool) -> anyhow::Result<String> {
        let json_result = Self::format_cycle(reports, dry_run);
        serde_json::to_string_pretty(&json_result)
            .map_err(|e| anyhow::anyhow!("Ошибка сериализации в JSON: {}", e))
    }
}
