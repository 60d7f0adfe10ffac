//! Fixed rates used when no rate service is configured.

use std::sync::Arc;

use fxwallet_common::{Currency, CurrencyPair};
use fxwallet_fx::{MockRateProvider, RateTable};

const RATES: [(Currency, Currency, &str); 6] = [
    (Currency::Rub, Currency::Usd, "0.011"),
    (Currency::Rub, Currency::Eur, "0.010"),
    (Currency::Usd, Currency::Rub, "90.25"),
    (Currency::Usd, Currency::Eur, "0.92"),
    (Currency::Eur, Currency::Rub, "98.10"),
    (Currency::Eur, Currency::Usd, "1.087"),
];

/// Provider quoting every supported pair.
pub fn mock_provider() -> Arc<MockRateProvider> {
    let provider = Arc::new(MockRateProvider::new());

    for (from, to, rate) in RATES {
        provider.set_rate(CurrencyPair::new(from, to), rate);
    }

    let mut table = RateTable::new();
    table.insert(Currency::Usd.code().to_string(), "1".to_string());
    table.insert(Currency::Rub.code().to_string(), "90.25".to_string());
    table.insert(Currency::Eur.code().to_string(), "0.92".to_string());
    provider.set_table(table);

    provider
}
