use std::{
    collections::BTreeMap,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use log::info;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wavgen_types::BurstRecord;

use crate::{TransmitConfig, TransmitSummary, TxError, TxResult};

/// Сведения о сессии в заголовке отчёта.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub activity_type: String,
    pub protocol: String,
    pub modality: String,
    pub modulation: String,
    pub device_origin: String,
    /// Отметки времени, командная строка и прочее
    pub misc: BTreeMap<String, Value>,
}

/// Документ отчёта в том виде, в каком он пишется на диск.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportDocument {
    pub metadata: ReportMetadata,
    pub bursts: Vec<BurstRecord>,
}

/// Накопитель отчёта об активности передатчика.
///
/// Записи burst'ов принимаются только в хронологическом порядке;
/// [`ActivityReport::finalize`] поглощает отчёт, так что записать его
/// дважды нельзя.
#[derive(Debug)]
pub struct ActivityReport {
    path: PathBuf,
    metadata: ReportMetadata,
    bursts: Vec<BurstRecord>,
}

impl ActivityReport {
    pub fn new<P: AsRef<Path>>(
        path: P,
        metadata: ReportMetadata,
    ) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            metadata,
            bursts: Vec::new(),
        }
    }

    /// Строка секции `misc`.
    pub fn cache_misc<V: Into<Value>>(
        &mut self,
        key: &str,
        value: V,
    ) {
        self.metadata.misc.insert(key.to_string(), value.into());
    }

    /// Добавляет запись о физически переданном burst'е.
    pub fn append(
        &mut self,
        burst: BurstRecord,
    ) -> TxResult<()> {
        if let Some(last) = self.bursts.last() {
            if burst.start_time < last.start_time {
                return Err(TxError::Report(format!(
                    "burst at {:.9}s appended after burst at {:.9}s",
                    burst.start_time, last.start_time
                )));
            }
        }

        self.bursts.push(burst);
        Ok(())
    }

    pub fn bursts(&self) -> &[BurstRecord] {
        &self.bursts
    }

    pub fn metadata(&self) -> &ReportMetadata {
        &self.metadata
    }

    /// Записывает отчёт на диск и возвращает путь к файлу.
    pub fn finalize(self) -> TxResult<PathBuf> {
        let doc = ReportDocument {
            metadata: self.metadata,
            bursts: self.bursts,
        };

        let mut w = BufWriter::new(File::create(&self.path)?);
        serde_json::to_writer_pretty(&mut w, &doc)?;
        w.write_all(b"\n")?;
        w.flush()?;

        info!(
            "Activity report written: {:?} ({} bursts)",
            self.path,
            doc.bursts.len()
        );

        Ok(self.path)
    }
}

/// Собирает отчёт по итогам сессии: метаданные из конфигурации, отметки
/// времени, командная строка и все переданные burst'ы.
pub fn build_report<P: AsRef<Path>>(
    path: P,
    config: &TransmitConfig,
    summary: &TransmitSummary,
    command: &str,
) -> TxResult<ActivityReport> {
    let metadata = ReportMetadata {
        activity_type: "lowprob_anomaly".to_string(),
        protocol: "unknown".to_string(),
        modality: config.modality().to_string(),
        modulation: config.waveform.modulation_label().to_string(),
        device_origin: config.device_args.clone(),
        misc: BTreeMap::new(),
    };

    let mut report = ActivityReport::new(path, metadata);

    for (marker, t) in summary.timeline.iter() {
        report.cache_misc(marker.key(), t);
    }
    report.cache_misc("command", command);
    report.cache_misc("waveform", config.waveform.kind().to_string());

    for burst in &summary.bursts {
        report.append(burst.clone())?;
    }

    Ok(report)
}
