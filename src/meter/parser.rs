use roxmltree::Document;
use tracing::{debug, error, warn};

use super::RegisterMap;

/// Register element tag in the eGauge XML document.
const REGISTER_TAG: &str = "r";
/// Attribute carrying the register name.
const NAME_ATTR: &str = "n";
/// Child holding the interpreted (typed, scaled) value. The raw accumulator lives in `v`.
const INTERPRETED_TAG: &str = "i";

/// Outcome of a parse, including the registers that were rejected for a non-numeric value.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParseReport {
    pub registers: RegisterMap,
    pub invalid: Vec<String>,
}

/// Parse an eGauge register document into a map of interpreted values.
///
/// Never fails: a malformed document yields an empty map.
pub fn parse_registers(xml: &str) -> RegisterMap {
    parse_registers_with_report(xml).registers
}

pub fn parse_registers_with_report(xml: &str) -> ParseReport {
    let mut report = ParseReport::default();

    let document = match Document::parse(xml) {
        Ok(document) => document,
        Err(e) => {
            error!(error = %e, "XML parse error");
            return report;
        }
    };

    let registers = document
        .root_element()
        .descendants()
        .skip(1)
        .filter(|node| node.is_element() && node.has_tag_name(REGISTER_TAG));

    for register in registers {
        let name = register.attribute(NAME_ATTR).unwrap_or_default().trim();
        if name.is_empty() {
            continue;
        }

        let Some(text) = register
            .children()
            .find(|child| child.is_element() && child.has_tag_name(INTERPRETED_TAG))
            .and_then(|node| node.text())
            .filter(|text| !text.is_empty())
        else {
            continue;
        };

        match text.trim().parse::<f64>() {
            Ok(value) if value.is_finite() => {
                debug!(register = name, value, "Parsed register");
                report.registers.insert(name.to_string(), value);
            }
            _ => {
                warn!(register = name, value = text, "Invalid numeric value");
                report.invalid.push(name.to_string());
            }
        }
    }

    report
}
