use crate::catalog::Property;
use crate::error::{CatalogError, Result};
use crate::units::{DataType, Scale, Unit, MAX_EXPONENT, MIN_EXPONENT};

pub(crate) fn validate_name(name: &str, max: usize) -> Result<()> {
    if name.len() > max {
        return Err(CatalogError::NameTooLong {
            name: name.to_string(),
            len: name.len(),
            max,
        });
    }
    Ok(())
}

pub(crate) fn validate_property(interface: usize, index: usize, property: &Property) -> Result<()> {
    let fail = |reason: String| CatalogError::InvalidProperty {
        interface,
        property: index,
        reason,
    };

    if property.element_count == 0 {
        return Err(fail("element count must be at least 1".to_string()));
    }

    if let Scale::Decimal(exponent) = property.scale {
        if !(MIN_EXPONENT..=MAX_EXPONENT).contains(&exponent) {
            return Err(fail(format!(
                "exponent {exponent} outside {MIN_EXPONENT}..={MAX_EXPONENT}"
            )));
        }
    }

    if property.data_type == DataType::RgbTriplet && property.unit != Unit::Rgb {
        return Err(fail("rgb_triplet requires the rgb unit".to_string()));
    }

    match property.unit {
        Unit::Bool => {
            if property.data_type != DataType::U8 || property.element_count != 1 {
                return Err(fail("bool must be a single u8".to_string()));
            }
        }
        Unit::Rgb => {
            let ok = match property.data_type {
                DataType::U8 => matches!(property.element_count, 3 | 4),
                DataType::RgbTriplet => property.element_count == 1,
                _ => false,
            };
            if !ok {
                return Err(fail(
                    "rgb must be u8 x3, u8 x4 or a single rgb_triplet".to_string(),
                ));
            }
        }
        Unit::Utf8Text => {
            if property.data_type != DataType::U8 {
                return Err(fail("utf8_text must use u8 elements".to_string()));
            }
        }
        Unit::Enum => {
            if !property.data_type.is_enum_capable() {
                return Err(fail(format!(
                    "enum cannot be backed by {:?}",
                    property.data_type
                )));
            }
        }
        _ => {}
    }

    Ok(())
}
