use reqwest::Url;
use serde::Serialize;

#[derive(Clone, Copy, Debug, Serialize)]
pub struct RestaurantInfo {
    pub name: &'static str,
    pub phone: &'static str,
    pub whatsapp: &'static str,
    pub location: &'static str,
}

pub const RESTAURANT: RestaurantInfo = RestaurantInfo {
    name: "Gracious Fast Food",
    phone: "+2347068071343",
    whatsapp: "+2347068071343",
    location: "Gracious Fast Food beside Overcomers Church Agbaja Road Felele Lokoja",
};

const MAPS_SEARCH_URL: &str = "https://www.google.com/maps/search/";
const WHATSAPP_BASE_URL: &str = "https://wa.me/";
const ORDER_GREETING: &str = "Hello! I would like to place an order from Gracious Fast Food.";

/// The page actions a visitor can trigger from the control surface.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageAction {
    Directions,
    Call,
    Chat,
}

impl PageAction {
    pub fn url(self, info: &RestaurantInfo) -> anyhow::Result<String> {
        match self {
            PageAction::Directions => directions_url(info),
            PageAction::Call => Ok(call_url(info)),
            PageAction::Chat => chat_url(info),
        }
    }
}

pub fn directions_url(info: &RestaurantInfo) -> anyhow::Result<String> {
    let url = Url::parse_with_params(MAPS_SEARCH_URL, &[("api", "1"), ("query", info.location)])?;
    Ok(url.to_string())
}

pub fn call_url(info: &RestaurantInfo) -> String {
    format!("tel:{}", info.phone)
}

pub fn chat_url(info: &RestaurantInfo) -> anyhow::Result<String> {
    let mut url = Url::parse(WHATSAPP_BASE_URL)?.join(info.whatsapp)?;
    url.query_pairs_mut().append_pair("text", ORDER_GREETING);
    Ok(url.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query_value(url: &str, key: &str) -> Option<String> {
        Url::parse(url)
            .ok()?
            .query_pairs()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.into_owned())
    }

    #[test]
    fn call_url_dials_fixed_number() {
        assert_eq!(call_url(&RESTAURANT), "tel:+2347068071343");
        assert_eq!(PageAction::Call.url(&RESTAURANT).unwrap(), "tel:+2347068071343");
    }

    #[test]
    fn directions_url_encodes_address() {
        let url = directions_url(&RESTAURANT).unwrap();
        assert!(url.starts_with("https://www.google.com/maps/search/?api=1&query="));
        assert!(!url.contains(' '));
        assert_eq!(query_value(&url, "api").as_deref(), Some("1"));
        assert_eq!(query_value(&url, "query").as_deref(), Some(RESTAURANT.location));
    }

    #[test]
    fn chat_url_preloads_greeting() {
        let url = chat_url(&RESTAURANT).unwrap();
        assert!(url.starts_with("https://wa.me/+2347068071343?text="));
        assert!(!url.contains(' '));
        assert!(!url.contains('!'));
        assert_eq!(query_value(&url, "text").as_deref(), Some(ORDER_GREETING));
    }
}
