//! Turns an extracted vehicle into the record and image list a fill run
//! consumes.

use crate::config::DESCRIPTION_IMAGE_CAP;
use crate::engine::record::{FieldRecord, FieldValue, ImageList};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_VEHICLE_TYPE: &str = "Car/Truck";

/// A vehicle as the extraction side hands it over.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VehicleListing {
    pub vehicle_type: Option<String>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<FieldValue>,
    pub trim: Option<String>,
    pub price: Option<FieldValue>,
    pub msrp: Option<FieldValue>,
    pub kilometers: Option<FieldValue>,
    pub body_type: Option<String>,
    pub transmission: Option<String>,
    pub drivetrain: Option<String>,
    pub fuel_type: Option<String>,
    pub engine: Option<String>,
    pub exterior_color: Option<String>,
    pub interior_color: Option<String>,
    pub stock_number: Option<String>,
    pub vin: Option<String>,
    pub description: Option<String>,
    pub dealer_name: Option<String>,
    pub dealer_location: Option<String>,
    pub source_url: Option<String>,
    pub images: Vec<String>,
}

fn text(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn scalar(value: &Option<FieldValue>) -> Option<String> {
    value
        .as_ref()
        .map(|v| v.to_string().trim().to_string())
        .filter(|v| !v.is_empty())
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

/// `$21,000`, or `None` when the value holds no number.
pub fn format_price(raw: &str) -> Option<String> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    if cleaned.chars().all(|c| c == '.') {
        return None;
    }
    let (whole, fraction) = cleaned.split_once('.').unwrap_or((cleaned.as_str(), ""));
    let whole = whole.trim_start_matches('0');
    let whole = if whole.is_empty() { "0" } else { whole };
    let fraction: String = fraction.chars().take(2).collect();
    if fraction.trim_end_matches('0').is_empty() {
        Some(format!("${}", group_thousands(whole)))
    } else {
        Some(format!("${}.{:0<2}", group_thousands(whole), fraction))
    }
}

fn format_count(raw: &str) -> String {
    if !raw.is_empty() && raw.chars().all(|c| c.is_ascii_digit()) {
        group_thousands(raw)
    } else {
        raw.to_string()
    }
}

impl VehicleListing {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read listing {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse listing {}", path.display()))
    }

    /// `2022 Toyota Corolla LE`; `None` until year, make and model are known.
    pub fn title(&self) -> Option<String> {
        let year = scalar(&self.year)?;
        let make = text(&self.make)?;
        let model = text(&self.model)?;
        let mut title = format!("{} {} {}", year, make, model);
        if let Some(trim) = text(&self.trim) {
            title.push(' ');
            title.push_str(trim);
        }
        Some(title)
    }

    /// Multi-section description for the listing body.
    pub fn compose_description(&self) -> String {
        let mut out = String::new();

        if let Some(title) = self.title() {
            out.push_str(&title);
            out.push_str("\n\n");
        }

        let price = scalar(&self.price).and_then(|p| format_price(&p));
        let msrp = scalar(&self.msrp)
            .and_then(|m| format_price(&m))
            .filter(|m| Some(m) != price.as_ref());
        if let Some(price) = &price {
            out.push_str(&format!("Price: {}\n", price));
        }
        if let Some(msrp) = &msrp {
            out.push_str(&format!("MSRP: {}\n", msrp));
        }
        if price.is_some() || msrp.is_some() {
            out.push('\n');
        }

        if let Some(km) = scalar(&self.kilometers) {
            out.push_str(&format!("Kilometers: {}\n", format_count(&km)));
        }

        let specs: Vec<String> = [
            ("Body Type", &self.body_type),
            ("Transmission", &self.transmission),
            ("Drivetrain", &self.drivetrain),
            ("Fuel Type", &self.fuel_type),
            ("Engine", &self.engine),
            ("Exterior Color", &self.exterior_color),
            ("Interior Color", &self.interior_color),
        ]
        .into_iter()
        .filter_map(|(name, value)| text(value).map(|v| format!("{}: {}", name, v)))
        .collect();
        if !specs.is_empty() {
            out.push_str(&specs.join("\n"));
            out.push_str("\n\n");
        }

        if let Some(stock) = text(&self.stock_number) {
            out.push_str(&format!("Stock Number: {}\n", stock));
        }
        if let Some(vin) = text(&self.vin) {
            out.push_str(&format!("VIN: {}\n\n", vin));
        }

        if let Some(body) = text(&self.description) {
            out.push_str(body);
            out.push_str("\n\n");
        }

        if let Some(dealer) = text(&self.dealer_name) {
            out.push_str(&format!("Available at: {}", dealer));
            if let Some(location) = text(&self.dealer_location) {
                out.push_str(&format!(", {}", location));
            }
            out.push('\n');
        }

        if let Some(source) = text(&self.source_url) {
            out.push_str(&format!("Source: {}\n", source));
        }

        out.trim_end().to_string()
    }

    /// The read-only inputs for one fill run.
    pub fn into_run_input(self) -> (FieldRecord, ImageList) {
        let mut record = FieldRecord::new();
        record.set(
            "vehicleType",
            text(&self.vehicle_type).unwrap_or(DEFAULT_VEHICLE_TYPE),
        );

        let strings = [
            ("make", &self.make),
            ("model", &self.model),
            ("exteriorColor", &self.exterior_color),
            ("transmission", &self.transmission),
            ("fuelType", &self.fuel_type),
            ("location", &self.dealer_location),
        ];
        for (name, value) in strings {
            if let Some(value) = text(value) {
                record.set(name, value);
            }
        }

        let scalars = [
            ("year", &self.year),
            ("price", &self.price),
            ("mileage", &self.kilometers),
        ];
        for (name, value) in scalars {
            if let Some(value) = value.clone() {
                record.set(name, value);
            }
        }

        if let Some(title) = self.title() {
            record.set("title", title);
        }
        let description = self.compose_description();
        if !description.is_empty() {
            record.set("description", description);
        }

        let images = ImageList::new(self.images.into_iter().take(DESCRIPTION_IMAGE_CAP));
        (record, images)
    }
}
