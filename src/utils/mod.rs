use url::Url;

/// Result of splitting a referral code out of an inbound page URL.
pub struct ReferralSplit {
    pub code: String,
    /// Original URL with every occurrence of the referral parameter
    /// removed and all other query parameters preserved in order.
    pub cleaned_url: String,
}

/// Extract a non-empty referral code from `raw_url`.
///
/// Returns `None` when the URL does not parse, the parameter is absent,
/// or its value is empty; in all those cases the URL is left alone.
pub fn split_referral(raw_url: &str, param: &str) -> Option<ReferralSplit> {
    let mut url = Url::parse(raw_url).ok()?;

    let code = url
        .query_pairs()
        .find(|(key, value)| key == param && !value.is_empty())
        .map(|(_, value)| value.into_owned())?;

    let remaining: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| key != param)
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    if remaining.is_empty() {
        url.set_query(None);
    } else {
        url.query_pairs_mut()
            .clear()
            .extend_pairs(remaining.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    }

    Some(ReferralSplit {
        code,
        cleaned_url: url.into(),
    })
}
