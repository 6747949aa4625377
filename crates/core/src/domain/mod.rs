pub mod commit;
pub mod contract;
pub mod forecast;
pub mod projection;
pub mod scenario;
pub mod status;

use serde::{Deserialize, Deserializer};

// serde_json writes non-finite floats as `null`; read them back as NaN.
pub(crate) fn f64_or_nan<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or(f64::NAN))
}
