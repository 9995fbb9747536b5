//! Per-portal vocabulary and control idioms

use crate::locator::FieldType;
use crate::upload::UploadPattern;

/// How a portal asks for a categorical value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceControl {
    /// A `<select>` found through the field locator
    Select,
    /// A row of buttons or tiles, chosen by visible text
    ButtonText,
}

/// Static description of one portal's listing form
#[derive(Debug)]
pub struct SiteProfile {
    pub key: &'static str,
    /// Registrable domains; subdomains match too
    pub hosts: &'static [&'static str],
    /// Site selectors tried before the generic table
    pub overrides: &'static [(FieldType, &'static [&'static str])],
    pub purpose_control: ChoiceControl,
    pub property_type_control: ChoiceControl,
    /// Whether the form lives inside web components
    pub search_shadow_dom: bool,
    /// Fixed upload idiom; detected when `None`
    pub upload_pattern: Option<UploadPattern>,
    /// Key into the image requirements table
    pub image_platform: &'static str,
}

pub static BAYUT: SiteProfile = SiteProfile {
    key: "bayut",
    hosts: &["bayut.com"],
    overrides: &[
        (FieldType::Title, &["input[name='title_en']", "[data-testid='listing-title'] input"]),
        (FieldType::Description, &["textarea[name='description_en']"]),
        (FieldType::Price, &["[data-testid='price-field'] input"]),
        (FieldType::Size, &["input[name='area_sqft']"]),
        (FieldType::Reference, &["input[name='permit_reference']"]),
    ],
    purpose_control: ChoiceControl::ButtonText,
    property_type_control: ChoiceControl::ButtonText,
    search_shadow_dom: false,
    upload_pattern: None,
    image_platform: "bayut",
};

pub static DUBIZZLE: SiteProfile = SiteProfile {
    key: "dubizzle",
    hosts: &["dubizzle.com"],
    overrides: &[
        (FieldType::Title, &["input[name='ad_title']"]),
        (FieldType::Description, &["textarea[name='ad_description']"]),
        (FieldType::Size, &["input[name='size_sqft']"]),
        (FieldType::Community, &["input[name='neighbourhood']", "input[placeholder*='neighbourhood' i]"]),
    ],
    purpose_control: ChoiceControl::ButtonText,
    property_type_control: ChoiceControl::Select,
    search_shadow_dom: true,
    upload_pattern: None,
    image_platform: "dubizzle",
};

pub static PROPERTY_FINDER: SiteProfile = SiteProfile {
    key: "propertyfinder",
    hosts: &["propertyfinder.ae"],
    overrides: &[
        (FieldType::Title, &["input[name='listing[title]']"]),
        (FieldType::Description, &["textarea[name='listing[description]']"]),
        (FieldType::Price, &["input[name='listing[price]']"]),
        (FieldType::Bedrooms, &["select[name='listing[bedrooms]']"]),
        (FieldType::Bathrooms, &["select[name='listing[bathrooms]']"]),
        (FieldType::Size, &["input[name='listing[size]']"]),
    ],
    purpose_control: ChoiceControl::Select,
    property_type_control: ChoiceControl::Select,
    search_shadow_dom: false,
    upload_pattern: Some(UploadPattern::DragDrop),
    image_platform: "propertyfinder",
};

pub static JUST_PROPERTY: SiteProfile = SiteProfile {
    key: "justproperty",
    hosts: &["justproperty.com"],
    overrides: &[(FieldType::Reference, &["input[name='ref']"])],
    purpose_control: ChoiceControl::Select,
    property_type_control: ChoiceControl::Select,
    search_shadow_dom: true,
    upload_pattern: None,
    image_platform: "justproperty",
};

impl SiteProfile {
    /// Site-specific selectors for `field`
    pub fn overrides_for(&self, field: FieldType) -> &'static [&'static str] {
        self.overrides
            .iter()
            .find(|(f, _)| *f == field)
            .map_or(&[], |(_, selectors)| selectors)
    }

    pub fn control_for(&self, field: FieldType) -> ChoiceControl {
        match field {
            FieldType::Purpose => self.purpose_control,
            FieldType::PropertyType => self.property_type_control,
            _ => ChoiceControl::Select,
        }
    }
}
