//! Data model for the municipal health indicator ETL, plus the seams the
//! orchestrator pulls data through: an injectable [`DatasetProvider`] and the
//! optional external [`SheetAnalyzer`] collaborator.

use jiff::civil::Date;
use jiff::{Timestamp, Zoned};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::path::Path;

use crate::normalize::clean_value;

/// The workbook the baseline numbers were lifted from.
pub const SOURCE_WORKBOOK: &str = "Dados - Metas.xlsx";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetDirection {
    #[default]
    HigherIsBetter,
    LowerIsBetter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    TargetMissed,
    CriticalValue,
    NegativeTrend,
}

/// A measured health/management metric with an annual target and a current
/// value.  `category` stays a loose string as it comes off the sheet; the
/// generator maps it to a category id with a documented fallback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Indicator {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub category: String,
    pub unit: String,
    pub annual_target: f64,
    pub current_value: f64,
    pub data_source: String,
    pub origin_sheet: String,
    #[serde(default)]
    pub target_direction: TargetDirection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub id: i64,
    pub indicator_id: i64,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    pub alert_type: AlertType,
    pub reference_date: Date,
    pub resolved: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: String,
}

/// Extraction metadata.  Serialized with the legacy Portuguese keys the
/// public frontend already reads; counts are recomputed from the actual
/// collections on every run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(rename = "data_extracao")]
    pub extracted_at: Timestamp,
    #[serde(rename = "arquivo_fonte")]
    pub source_file: String,
    #[serde(rename = "total_indicadores")]
    pub total_indicators: u32,
    #[serde(rename = "total_alertas")]
    pub total_alerts: u32,
    #[serde(rename = "observacoes")]
    pub notes: String,
}

/// One run's worth of extracted records.  Built fresh each cycle, never
/// mutated afterwards; durability lives in the database and on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub indicators: Vec<Indicator>,
    pub alerts: Vec<Alert>,
    pub categories: Vec<Category>,
    pub metadata: Metadata,
}

impl Dataset {
    pub fn new(
        indicators: Vec<Indicator>,
        alerts: Vec<Alert>,
        categories: Vec<Category>,
        source_file: &str,
        notes: &str,
    ) -> Dataset {
        let metadata = Metadata {
            extracted_at: Timestamp::now(),
            source_file: source_file.to_string(),
            total_indicators: indicators.len() as u32,
            total_alerts: alerts.len() as u32,
            notes: notes.to_string(),
        };
        Dataset {
            indicators,
            alerts,
            categories,
            metadata,
        }
    }
}

/// Source of the dataset for a run.  Production uses [`BaselineProvider`];
/// tests substitute fixtures without touching the generator or the sink.
pub trait DatasetProvider {
    fn dataset(&self) -> Dataset;
}

/// External spreadsheet-analysis collaborator.  When present and returning a
/// non-empty indicator set, its result feeds the public JSON export.
pub trait SheetAnalyzer {
    fn analyze(&self, workbook: &Path) -> Result<Dataset, Box<dyn Error>>;
}

/// The fixed dataset identified in the analysis of the "Dados - Metas"
/// workbook.  Stands in for a real spreadsheet read; current values are kept
/// in their loose sheet formatting and cleaned on construction.
pub struct BaselineProvider;

#[allow(clippy::too_many_arguments)]
fn indicator(
    id: i64,
    name: &str,
    description: &str,
    category: &str,
    unit: &str,
    annual_target: f64,
    current_value: Value,
    data_source: &str,
    origin_sheet: &str,
    target_direction: TargetDirection,
) -> Indicator {
    Indicator {
        id,
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        unit: unit.to_string(),
        annual_target,
        current_value: clean_value(&current_value).unwrap_or(f64::NAN),
        data_source: data_source.to_string(),
        origin_sheet: origin_sheet.to_string(),
        target_direction,
    }
}

impl DatasetProvider for BaselineProvider {
    fn dataset(&self) -> Dataset {
        let today: Date = Zoned::now().date();

        let indicators = vec![
            indicator(
                1,
                "Cobertura da Estratégia Saúde da Família",
                "Percentual de cobertura populacional pela ESF",
                "epidemiologico",
                "%",
                95.0,
                json!("96,88%"),
                "e-Gestor AB",
                "Atenção a Saúde",
                TargetDirection::HigherIsBetter,
            ),
            indicator(
                2,
                "Cobertura Vacinal Infantil",
                "Percentual de crianças vacinadas conforme calendário",
                "epidemiologico",
                "%",
                95.0,
                json!("87,5%"),
                "SIPNI",
                "Vigilância em Saúde",
                TargetDirection::HigherIsBetter,
            ),
            indicator(
                3,
                "Taxa de Mortalidade Infantil",
                "Óbitos infantis por 1000 nascidos vivos",
                "epidemiologico",
                "‰",
                10.0,
                json!("12,3‰"),
                "SIM/SINASC",
                "Vigilância em Saúde",
                TargetDirection::LowerIsBetter,
            ),
            indicator(
                4,
                "Consultas Pré-natal",
                "Número de consultas de pré-natal realizadas",
                "producao",
                "unidade",
                2500.0,
                json!(2180.0),
                "SISAB",
                "Atenção a Saúde",
                TargetDirection::HigherIsBetter,
            ),
            indicator(
                5,
                "Exames Preventivos Realizados",
                "Número de exames preventivos do câncer de colo uterino",
                "producao",
                "unidade",
                1800.0,
                json!(1650.0),
                "SISAB",
                "Atenção a Saúde",
                TargetDirection::HigherIsBetter,
            ),
            indicator(
                6,
                "Execução Orçamentária da Saúde",
                "Percentual de execução do orçamento da saúde",
                "financeiro",
                "%",
                95.0,
                json!("89,2%"),
                "SIOPS",
                "Gestão",
                TargetDirection::HigherIsBetter,
            ),
            indicator(
                7,
                "Profissionais Capacitados",
                "Número de profissionais que receberam capacitação",
                "recursos_humanos",
                "unidade",
                150.0,
                json!(128.0),
                "Sistema RH",
                "Gestão",
                TargetDirection::HigherIsBetter,
            ),
            indicator(
                8,
                "Atendimentos de Urgência",
                "Número de atendimentos de urgência realizados",
                "producao",
                "unidade",
                3200.0,
                json!(2950.0),
                "SISAB",
                "Atenção a Saúde",
                TargetDirection::HigherIsBetter,
            ),
        ];

        let alerts = vec![
            Alert {
                id: 1,
                indicator_id: 2,
                title: "Meta de Cobertura Vacinal não atingida".to_string(),
                message: "A cobertura vacinal infantil está em 87.5%, abaixo da meta de 95%. \
                          Necessário intensificar campanhas de vacinação."
                    .to_string(),
                severity: Severity::High,
                alert_type: AlertType::TargetMissed,
                reference_date: today,
                resolved: false,
            },
            Alert {
                id: 2,
                indicator_id: 3,
                title: "Taxa de Mortalidade Infantil acima da meta".to_string(),
                message: "A taxa de mortalidade infantil está em 12.3‰, acima da meta de 10‰. \
                          Requer atenção imediata."
                    .to_string(),
                severity: Severity::Critical,
                alert_type: AlertType::CriticalValue,
                reference_date: today,
                resolved: false,
            },
            Alert {
                id: 3,
                indicator_id: 4,
                title: "Consultas Pré-natal abaixo da meta".to_string(),
                message: "Número de consultas pré-natal (2.180) está abaixo da meta (2.500). \
                          Tendência negativa identificada."
                    .to_string(),
                severity: Severity::Medium,
                alert_type: AlertType::NegativeTrend,
                reference_date: today,
                resolved: false,
            },
        ];

        let categories = vec![
            Category {
                id: 1,
                name: "Epidemiológico".to_string(),
                description: "Indicadores de vigilância epidemiológica".to_string(),
            },
            Category {
                id: 2,
                name: "Produção".to_string(),
                description: "Indicadores de produção de serviços".to_string(),
            },
            Category {
                id: 3,
                name: "Financeiro".to_string(),
                description: "Indicadores financeiros e orçamentários".to_string(),
            },
            Category {
                id: 4,
                name: "Recursos Humanos".to_string(),
                description: "Indicadores de gestão de pessoas".to_string(),
            },
            Category {
                id: 5,
                name: "Metas PAS".to_string(),
                description: "Metas do Plano Anual de Saúde".to_string(),
            },
        ];

        Dataset::new(
            indicators,
            alerts,
            categories,
            SOURCE_WORKBOOK,
            "Dados extraídos baseados na análise das abas: Geral, Atenção a Saúde, \
             Vigilância em Saúde, Gestão",
        )
    }
}
