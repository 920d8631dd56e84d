use super::profile::{FieldKind, FieldTarget, FormProfile, ValueTransform};
use crate::engine::upload::{ADD_PHOTOS_SELECTORS, FILE_INPUT_SELECTORS};

const fn text(field: &'static str, selectors: &'static [&'static str]) -> FieldTarget {
    FieldTarget {
        field,
        kind: FieldKind::Text,
        selectors,
        label: None,
        placeholder: None,
        aria_label: None,
        role: None,
        slow: false,
        clear_first: false,
        transform: ValueTransform::AsIs,
    }
}

const fn choice(field: &'static str, selectors: &'static [&'static str]) -> FieldTarget {
    FieldTarget {
        kind: FieldKind::Choice,
        slow: true,
        ..text(field, selectors)
    }
}

pub const FIELDS: &[FieldTarget] = &[
    FieldTarget {
        label: Some("Vehicle type"),
        aria_label: Some("Vehicle type"),
        ..choice(
            "vehicleType",
            &[r#"[aria-label="Vehicle type"]"#, r#"[placeholder="Vehicle type"]"#],
        )
    },
    FieldTarget {
        label: Some("Make"),
        placeholder: Some("Make"),
        aria_label: Some("Make"),
        clear_first: true,
        ..text("make", &[r#"input[name="make"]"#, r#"input[aria-label="Make"]"#])
    },
    FieldTarget {
        label: Some("Model"),
        placeholder: Some("Model"),
        aria_label: Some("Model"),
        clear_first: true,
        ..text("model", &[r#"input[name="model"]"#, r#"input[aria-label="Model"]"#])
    },
    FieldTarget {
        label: Some("Year"),
        aria_label: Some("Year"),
        ..choice("year", &[r#"[aria-label="Year"]"#, r#"select[name="year"]"#])
    },
    FieldTarget {
        label: Some("Mileage"),
        placeholder: Some("Mileage"),
        aria_label: Some("Mileage"),
        transform: ValueTransform::DigitsOnly,
        ..text(
            "mileage",
            &[
                r#"input[name="mileage"]"#,
                r#"input[aria-label="Mileage"]"#,
                r#"input[placeholder*="Mileage"]"#,
                r#"input[id*="mileage"]"#,
            ],
        )
    },
    FieldTarget {
        label: Some("Exterior color"),
        aria_label: Some("Exterior color"),
        ..choice(
            "exteriorColor",
            &[
                r#"[aria-label="Exterior color"]"#,
                r#"[aria-label="Exterior Color"]"#,
                r#"select[name="exteriorColor"]"#,
            ],
        )
    },
    FieldTarget {
        label: Some("Transmission"),
        aria_label: Some("Transmission"),
        transform: ValueTransform::Transmission,
        ..choice(
            "transmission",
            &[r#"[aria-label="Transmission"]"#, r#"select[name="transmission"]"#],
        )
    },
    FieldTarget {
        label: Some("Fuel type"),
        aria_label: Some("Fuel type"),
        ..choice(
            "fuelType",
            &[
                r#"[aria-label="Fuel type"]"#,
                r#"[aria-label="Fuel Type"]"#,
                r#"select[name="fuelType"]"#,
            ],
        )
    },
    FieldTarget {
        label: Some("Title"),
        placeholder: Some("Title"),
        aria_label: Some("Title"),
        clear_first: true,
        ..text(
            "title",
            &[
                r#"input[name="title"]"#,
                r#"input[aria-label="Title"]"#,
                r#"input[placeholder*="Title"]"#,
                r#"input[id*="title"]"#,
            ],
        )
    },
    FieldTarget {
        label: Some("Price"),
        placeholder: Some("Price"),
        aria_label: Some("Price"),
        slow: true,
        clear_first: true,
        transform: ValueTransform::DigitsOnly,
        ..text(
            "price",
            &[
                r#"input[name="price"]"#,
                r#"input[aria-label="Price"]"#,
                r#"input[placeholder*="Price"]"#,
                r#"input[id*="price"]"#,
            ],
        )
    },
    FieldTarget {
        label: Some("Location"),
        placeholder: Some("Location"),
        aria_label: Some("Location"),
        ..text(
            "location",
            &[
                r#"input[name="location"]"#,
                r#"input[aria-label="Location"]"#,
                r#"input[placeholder*="Location"]"#,
            ],
        )
    },
    FieldTarget {
        label: Some("Description"),
        placeholder: Some("Description"),
        aria_label: Some("Description"),
        clear_first: true,
        ..text(
            "description",
            &[
                r#"textarea[name="description"]"#,
                r#"textarea[aria-label="Description"]"#,
                r#"textarea[placeholder*="Description"]"#,
                "textarea",
            ],
        )
    },
];

pub static PROFILE: FormProfile = FormProfile {
    id: "marketplace",
    name: "Marketplace vehicle listing",
    create_url: "https://www.facebook.com/marketplace/create/vehicle",
    color: "#1877f2",
    ready_selector: r#"input, select, [role="combobox"]"#,
    fields: FIELDS,
    file_input_selectors: FILE_INPUT_SELECTORS,
    add_photos_selectors: ADD_PHOTOS_SELECTORS,
    add_photos_label: "Add photos",
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vehicle_type_is_filled_first() {
        assert_eq!(FIELDS[0].field, "vehicleType");
        assert_eq!(FIELDS[0].kind, FieldKind::Choice);
        assert_eq!(FIELDS.last().map(|f| f.field), Some("description"));
    }

    #[test]
    fn every_field_has_a_direct_selector() {
        for target in FIELDS {
            assert!(!target.selectors.is_empty(), "{}", target.field);
            assert_eq!(target.query().selectors[0], target.selectors[0]);
        }
    }
}
