use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::autofill::rules::{AutoPopulationRule, FieldTransform};
use crate::domain::step::StepId;

/// Population rules per step, evaluated whenever order data arrives for
/// that step's draft.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleBook {
    rules: BTreeMap<StepId, Vec<AutoPopulationRule>>,
}

impl RuleBook {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Rule sets for the freight forms, using the key spellings the common
    /// marketplaces export.
    pub fn standard() -> Self {
        Self::empty()
            .with_rules(StepId::RateQuote, rate_quote_rules())
            .with_rules(StepId::BillOfLading, bill_of_lading_rules())
            .with_rules(StepId::PickupRequest, pickup_request_rules())
    }

    pub fn with_rules(mut self, step: StepId, rules: Vec<AutoPopulationRule>) -> Self {
        self.rules.insert(step, rules);
        self
    }

    pub fn rules_for(&self, step: StepId) -> &[AutoPopulationRule] {
        self.rules.get(&step).map(Vec::as_slice).unwrap_or(&[])
    }
}

fn ship_to(field: &str, suffixes: &[&str]) -> Vec<String> {
    let mut keys = Vec::new();
    for prefix in ["Ship to", "Shipping", "Recipient", "ShipTo"] {
        for suffix in suffixes {
            keys.push(format!("{prefix} {suffix}"));
        }
    }
    keys.push(field.to_owned());
    keys
}

fn ship_from(suffixes: &[&str]) -> Vec<String> {
    let mut keys = Vec::new();
    for prefix in ["Ship from", "Origin", "Warehouse"] {
        for suffix in suffixes {
            keys.push(format!("{prefix} {suffix}"));
        }
    }
    keys
}

fn rate_quote_rules() -> Vec<AutoPopulationRule> {
    vec![
        AutoPopulationRule::new("origin_zip", ship_from(&["Zip", "Zip Code", "Postal Code"]))
            .with_transform(FieldTransform::PostalCode),
        AutoPopulationRule::new(
            "destination_zip",
            ship_to("destination_zip", &["Zip", "Zip Code", "Postal Code"]),
        )
        .with_transform(FieldTransform::PostalCode),
        AutoPopulationRule::new("destination_city", ship_to("destination_city", &["City"]))
            .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new(
            "destination_state",
            ship_to("destination_state", &["State", "Province", "Region"]),
        )
        .with_transform(FieldTransform::Uppercase),
        AutoPopulationRule::new("destination_country", ship_to("destination_country", &["Country"]))
            .with_transform(FieldTransform::CountryCode),
        AutoPopulationRule::new("total_weight", ["Total Weight", "Shipping Weight", "Weight"]),
        AutoPopulationRule::new("piece_count", ["Piece Count", "Quantity", "Qty"]),
    ]
}

fn bill_of_lading_rules() -> Vec<AutoPopulationRule> {
    vec![
        AutoPopulationRule::new("consignee_name", ship_to("consignee_name", &["Name"])),
        AutoPopulationRule::new("consignee_name", ["Billing Name", "Bill to Name", "Buyer Name"]),
        AutoPopulationRule::new("consignee_company", ship_to("consignee_company", &["Company"])),
        AutoPopulationRule::new(
            "consignee_address1",
            ship_to("consignee_address1", &["Address 1", "Address1", "Street", "Address"]),
        )
        .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new(
            "consignee_address2",
            ship_to("consignee_address2", &["Address 2", "Address2"]),
        )
        .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new("consignee_city", ship_to("consignee_city", &["City"]))
            .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new(
            "consignee_state",
            ship_to("consignee_state", &["State", "Province", "Region"]),
        )
        .with_transform(FieldTransform::Uppercase),
        AutoPopulationRule::new(
            "consignee_zip",
            ship_to("consignee_zip", &["Zip", "Zip Code", "Postal Code"]),
        )
        .with_transform(FieldTransform::PostalCode),
        AutoPopulationRule::new("consignee_country", ship_to("consignee_country", &["Country"]))
            .with_transform(FieldTransform::CountryCode),
        AutoPopulationRule::new("consignee_phone", ship_to("consignee_phone", &["Phone"]))
            .with_transform(FieldTransform::DigitsOnly),
        AutoPopulationRule::new("consignee_phone", ["Buyer Phone", "Phone"])
            .with_transform(FieldTransform::DigitsOnly),
        AutoPopulationRule::new("consignee_email", ["Buyer Email", "Email", "Customer Email"])
            .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new(
            "purchase_order_number",
            ["PO Number", "Purchase Order", "Order Number", "Order ID"],
        ),
        AutoPopulationRule::new("shipper_name", ship_from(&["Name", "Contact"])),
        AutoPopulationRule::new("shipper_address1", ship_from(&["Address 1", "Address"]))
            .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new("shipper_city", ship_from(&["City"]))
            .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new("shipper_state", ship_from(&["State"]))
            .with_transform(FieldTransform::Uppercase),
        AutoPopulationRule::new("shipper_zip", ship_from(&["Zip", "Zip Code", "Postal Code"]))
            .with_transform(FieldTransform::PostalCode),
    ]
}

fn pickup_request_rules() -> Vec<AutoPopulationRule> {
    vec![
        AutoPopulationRule::new("pickup_contact_name", ship_from(&["Contact", "Name"])),
        AutoPopulationRule::new("pickup_contact_phone", ship_from(&["Phone"]))
            .with_transform(FieldTransform::DigitsOnly),
        AutoPopulationRule::new("pickup_address1", ship_from(&["Address 1", "Address"]))
            .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new("pickup_city", ship_from(&["City"]))
            .with_transform(FieldTransform::Trim),
        AutoPopulationRule::new("pickup_state", ship_from(&["State"]))
            .with_transform(FieldTransform::Uppercase),
        AutoPopulationRule::new("pickup_zip", ship_from(&["Zip", "Zip Code", "Postal Code"]))
            .with_transform(FieldTransform::PostalCode),
        AutoPopulationRule::new("customer_reference", ["Order Number", "Order ID", "PO Number"]),
    ]
}
