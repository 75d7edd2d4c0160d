// [libs/domain/pricing/src/lib.rs]
/*!
 * =================================================================
 * APARATO: PRICING CORE ENGINE (V2.3 - GOLD MASTER)
 * CLASIFICACIÓN: DOMAIN LOGIC (ESTRATO L2)
 * RESPONSABILIDAD: GOBERNANZA DETERMINISTA DEL COSTO DE EXTRACCIÓN
 *
 * VISION HIPER-HOLÍSTICA 2026:
 * 1. VERSIONED SCHEDULE: El tarifario viaja con número de versión y se
 *    sella como snapshot dentro de cada cotización; el precio original
 *    es reproducible tras cualquier cambio de tarifas.
 * 2. PURE ARITHMETIC: Sin I/O, sin reloj, sin aleatoriedad. Entradas
 *    idénticas producen costos idénticos bit a bit.
 * 3. NOMINAL PURITY: Nomenclatura nominal absoluta.
 *
 * # Mathematical Proof (Deterministic Cost):
 * costo(archivo) = base + Σ recargos(op) + bucket(megapíxeles), donde
 * bucket es una función escalonada total sobre ℝ⁺. La suma sobre archivos
 * es asociativa en i64, por lo que el total no depende del orden.
 * =================================================================
 */

use espectro_domain_models::{FileQuoteLine, UploadedFileDescriptor};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use typeshare::typeshare;

#[derive(Error, Debug)]
pub enum PricingError {
    /// El snapshot persistido no corresponde a un tarifario válido.
    #[error("[L2_PRICING_FAULT]: SCHEDULE_SNAPSHOT_CORRUPTED -> {0}")]
    SnapshotCorrupted(String),
}

/// Operaciones premium solicitadas junto a la extracción.
#[typeshare]
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PremiumOperationFlags {
    #[serde(default)]
    pub embedding: bool,
    #[serde(default)]
    pub ocr: bool,
    #[serde(default)]
    pub forensics: bool,
}

impl PremiumOperationFlags {
    const BIT_EMBEDDING: u32 = 1 << 0;
    const BIT_OCR: u32 = 1 << 1;
    const BIT_FORENSICS: u32 = 1 << 2;

    /// Forma compacta persistida en la fila de cotización.
    pub fn to_bitfield(&self) -> u32 {
        let mut bitfield = 0;
        if self.embedding {
            bitfield |= Self::BIT_EMBEDDING;
        }
        if self.ocr {
            bitfield |= Self::BIT_OCR;
        }
        if self.forensics {
            bitfield |= Self::BIT_FORENSICS;
        }
        bitfield
    }

    pub fn from_bitfield(bitfield: u32) -> Self {
        Self {
            embedding: bitfield & Self::BIT_EMBEDDING != 0,
            ocr: bitfield & Self::BIT_OCR != 0,
            forensics: bitfield & Self::BIT_FORENSICS != 0,
        }
    }
}

/// Escalón de recargo por volumen de megapíxeles.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MegapixelBucket {
    /// Límite superior inclusivo del escalón.
    pub up_to_megapixels: f64,
    pub surcharge_credits: i64,
}

/// Tarifario vigente. Inmutable durante una petición; versionado para
/// su sellado dentro de cotizaciones.
#[typeshare]
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricingSchedule {
    pub schedule_version: u32,
    pub base_cost_credits: i64,
    pub embedding_cost_credits: i64,
    pub ocr_cost_credits: i64,
    pub forensics_cost_credits: i64,

    /// Escalones ordenados ascendentemente por 'up_to_megapixels'.
    pub megapixel_buckets: Vec<MegapixelBucket>,

    /// Recargo aplicado más allá del último escalón.
    pub overflow_surcharge_credits: i64,
}

impl Default for PricingSchedule {
    fn default() -> Self {
        Self {
            schedule_version: 3,
            base_cost_credits: 1,
            embedding_cost_credits: 2,
            ocr_cost_credits: 2,
            forensics_cost_credits: 3,
            megapixel_buckets: vec![
                MegapixelBucket { up_to_megapixels: 12.0, surcharge_credits: 0 },
                MegapixelBucket { up_to_megapixels: 24.0, surcharge_credits: 1 },
                MegapixelBucket { up_to_megapixels: 48.0, surcharge_credits: 2 },
            ],
            overflow_surcharge_credits: 4,
        }
    }
}

/// Desglose completo de una cotización calculada.
#[derive(Debug, Clone, PartialEq)]
pub struct QuotePricingBreakdown {
    pub per_file_credits: Vec<FileQuoteLine>,
    pub credits_total: i64,
}

impl PricingSchedule {
    /// Recargo escalonado por megapíxeles. Función total: todo volumen
    /// cae en un escalón o en el recargo de desborde.
    pub fn megapixel_surcharge(&self, megapixels: f64) -> i64 {
        for bucket in &self.megapixel_buckets {
            if megapixels <= bucket.up_to_megapixels {
                return bucket.surcharge_credits;
            }
        }
        self.overflow_surcharge_credits
    }

    /// Costo determinista de un archivo individual.
    pub fn compute_file_cost(
        &self,
        file: &UploadedFileDescriptor,
        operations: &PremiumOperationFlags,
    ) -> i64 {
        let mut credit_cost = self.base_cost_credits;

        if operations.embedding {
            credit_cost += self.embedding_cost_credits;
        }
        if operations.ocr {
            credit_cost += self.ocr_cost_credits;
        }
        if operations.forensics {
            credit_cost += self.forensics_cost_credits;
        }

        credit_cost + self.megapixel_surcharge(file.megapixels)
    }

    /// Desglose por archivo y total de la cotización.
    pub fn compute_quote_breakdown(
        &self,
        files: &[UploadedFileDescriptor],
        operations: &PremiumOperationFlags,
    ) -> QuotePricingBreakdown {
        let per_file_credits: Vec<FileQuoteLine> = files
            .iter()
            .map(|file| FileQuoteLine {
                original_filename: file.original_filename.clone(),
                credit_cost: self.compute_file_cost(file, operations),
            })
            .collect();

        let credits_total = per_file_credits.iter().map(|line| line.credit_cost).sum();

        QuotePricingBreakdown { per_file_credits, credits_total }
    }

    /// Sella el tarifario como snapshot JSON para la fila de cotización.
    pub fn to_snapshot(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("PricingSchedule serialization is infallible")
    }

    /// Reconstruye el tarifario exacto desde el snapshot persistido.
    pub fn from_snapshot(snapshot: &serde_json::Value) -> Result<Self, PricingError> {
        serde_json::from_value(snapshot.clone())
            .map_err(|deserialization_fault| {
                PricingError::SnapshotCorrupted(deserialization_fault.to_string())
            })
    }
}
