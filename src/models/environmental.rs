use crate::error::{PlantDiagError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvField {
    SoilMoisture,
    SoilTemperature,
    SoilPh,
    AirTemperature,
    AirHumidity,
}

impl EnvField {
    pub const ALL: [EnvField; 5] = [
        EnvField::SoilMoisture,
        EnvField::SoilTemperature,
        EnvField::SoilPh,
        EnvField::AirTemperature,
        EnvField::AirHumidity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EnvField::SoilMoisture => "soil_moisture",
            EnvField::SoilTemperature => "soil_temperature",
            EnvField::SoilPh => "soil_ph",
            EnvField::AirTemperature => "air_temperature",
            EnvField::AirHumidity => "air_humidity",
        }
    }

    /// Label used in the model prompt.
    pub fn prompt_label(&self) -> &'static str {
        match self {
            EnvField::SoilMoisture => "土壤湿度",
            EnvField::SoilTemperature => "土壤温度",
            EnvField::SoilPh => "土壤pH值",
            EnvField::AirTemperature => "空气温度",
            EnvField::AirHumidity => "空气湿度",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            EnvField::SoilMoisture | EnvField::AirHumidity => "%",
            EnvField::SoilTemperature | EnvField::AirTemperature => "°C",
            EnvField::SoilPh => "",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "soil_moisture" | "soilmoisture" | "moisture" => Some(EnvField::SoilMoisture),
            "soil_temperature" | "soiltemperature" | "soil_temp" => {
                Some(EnvField::SoilTemperature)
            }
            "soil_ph" | "soilph" | "ph" => Some(EnvField::SoilPh),
            "air_temperature" | "airtemperature" | "air_temp" => Some(EnvField::AirTemperature),
            "air_humidity" | "airhumidity" | "humidity" => Some(EnvField::AirHumidity),
            _ => None,
        }
    }
}

impl std::fmt::Display for EnvField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Snapshot of field sensor readings supplied alongside a photo.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvReading {
    pub soil_moisture_percent: f64,
    pub soil_temperature_c: f64,
    pub soil_ph: f64,
    pub air_temperature_c: f64,
    pub air_humidity_percent: f64,
    pub timestamp: DateTime<Utc>,
}

impl EnvReading {
    pub fn new(
        soil_moisture_percent: f64,
        soil_temperature_c: f64,
        soil_ph: f64,
        air_temperature_c: f64,
        air_humidity_percent: f64,
    ) -> Self {
        Self {
            soil_moisture_percent,
            soil_temperature_c,
            soil_ph,
            air_temperature_c,
            air_humidity_percent,
            timestamp: Utc::now(),
        }
    }

    pub fn value(&self, field: EnvField) -> f64 {
        match field {
            EnvField::SoilMoisture => self.soil_moisture_percent,
            EnvField::SoilTemperature => self.soil_temperature_c,
            EnvField::SoilPh => self.soil_ph,
            EnvField::AirTemperature => self.air_temperature_c,
            EnvField::AirHumidity => self.air_humidity_percent,
        }
    }

    /// Parse `soil_moisture=45,soil_temperature=21.5,...`. All five fields are required.
    pub fn from_pairs(input: &str) -> Result<Self> {
        let mut values: [Option<f64>; 5] = [None; 5];

        for pair in input.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (key, raw) = pair.split_once('=').ok_or_else(|| {
                PlantDiagError::InvalidInput(format!("expected key=value, got '{}'", pair))
            })?;

            let field = EnvField::from_str(key).ok_or_else(|| {
                PlantDiagError::InvalidInput(format!("unknown environment field '{}'", key))
            })?;

            let value: f64 = raw.trim().parse().map_err(|_| {
                PlantDiagError::InvalidInput(format!("invalid number for {}: '{}'", field, raw))
            })?;

            let slot = EnvField::ALL
                .iter()
                .position(|f| *f == field)
                .unwrap_or_default();
            values[slot] = Some(value);
        }

        let missing: Vec<&str> = EnvField::ALL
            .iter()
            .zip(values.iter())
            .filter(|(_, v)| v.is_none())
            .map(|(f, _)| f.as_str())
            .collect();

        if !missing.is_empty() {
            return Err(PlantDiagError::InvalidInput(format!(
                "missing environment fields: {}",
                missing.join(", ")
            )));
        }

        let get = |i: usize| values[i].unwrap_or_default();
        Ok(Self::new(get(0), get(1), get(2), get(3), get(4)))
    }

    /// Environment block appended to the diagnosis prompt.
    pub fn prompt_block(&self) -> String {
        let mut block = String::from("环境数据:");
        for field in EnvField::ALL {
            block.push_str(&format!(
                "\n- {}: {}{}",
                field.prompt_label(),
                self.value(field),
                field.unit()
            ));
        }
        block
    }
}
