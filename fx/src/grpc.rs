//! gRPC client for the external exchange rate service.

use std::time::Duration;

use async_trait::async_trait;
use fxwallet_common::CurrencyPair;
use tonic::codec::ProstCodec;
use tonic::codegen::http::uri::PathAndQuery;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Status};
use tracing::debug;

use crate::error::{FxError, FxResult};
use crate::provider::{RateProvider, RateTable};

const GET_ALL_RATES_PATH: &str = "/exchange.ExchangeService/GetExchangeRates";
const GET_RATE_PATH: &str = "/exchange.ExchangeService/GetExchangeRateForCurrency";

/// Wire messages of the `exchange` protobuf package.
pub mod proto {
    use std::collections::HashMap;

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct Empty {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CurrencyRequest {
        #[prost(string, tag = "1")]
        pub from_currency: String,
        #[prost(string, tag = "2")]
        pub to_currency: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ExchangeRateResponse {
        #[prost(string, tag = "1")]
        pub from_currency: String,
        #[prost(string, tag = "2")]
        pub to_currency: String,
        #[prost(string, tag = "3")]
        pub rate: String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ExchangeRatesResponse {
        #[prost(map = "string, string", tag = "1")]
        pub rates: HashMap<String, String>,
    }
}

/// Rate provider speaking to the exchange service over gRPC.
///
/// The channel connects lazily and reconnects on its own; every call carries
/// the configured deadline.
#[derive(Clone)]
pub struct GrpcRateProvider {
    channel: Channel,
    timeout: Duration,
}

impl GrpcRateProvider {
    /// Create a provider for `addr` without connecting yet.
    pub fn connect_lazy(addr: &str, timeout: Duration) -> FxResult<Self> {
        let endpoint = Endpoint::from_shared(addr.to_string())
            .map_err(|e| FxError::InvalidEndpoint(format!("{addr}: {e}")))?
            .connect_timeout(timeout)
            .timeout(timeout);

        Ok(Self {
            channel: endpoint.connect_lazy(),
            timeout,
        })
    }

    async fn unary<Req, Resp>(&self, path: &'static str, message: Req) -> Result<Resp, Status>
    where
        Req: prost::Message + Send + Sync + 'static,
        Resp: prost::Message + Default + Send + Sync + 'static,
    {
        let mut grpc = tonic::client::Grpc::new(self.channel.clone());
        grpc.ready()
            .await
            .map_err(|e| Status::unavailable(format!("rate service not ready: {e}")))?;

        let mut request = tonic::Request::new(message);
        request.set_timeout(self.timeout);

        let codec: ProstCodec<Req, Resp> = ProstCodec::default();
        let response = grpc
            .unary(request, PathAndQuery::from_static(path), codec)
            .await?;
        Ok(response.into_inner())
    }
}

/// Translate a gRPC status into the rate layer's error.
fn map_status(status: Status, pair: Option<CurrencyPair>) -> FxError {
    match (status.code(), pair) {
        (Code::NotFound, Some(pair)) => FxError::RateNotAvailable(pair),
        (Code::Unavailable | Code::DeadlineExceeded | Code::Cancelled, _) => {
            FxError::ProviderUnavailable(status.message().to_string())
        }
        (code, _) => FxError::ProviderError(format!("{code:?}: {}", status.message())),
    }
}

#[async_trait]
impl RateProvider for GrpcRateProvider {
    fn name(&self) -> &str {
        "GRPC"
    }

    async fn get_all_rates(&self) -> FxResult<RateTable> {
        let response: proto::ExchangeRatesResponse = self
            .unary(GET_ALL_RATES_PATH, proto::Empty {})
            .await
            .map_err(|s| map_status(s, None))?;

        debug!(entries = response.rates.len(), "Rate table received");
        Ok(response.rates.into_iter().collect())
    }

    async fn get_rate(&self, pair: &CurrencyPair) -> FxResult<String> {
        let request = proto::CurrencyRequest {
            from_currency: pair.from.code().to_string(),
            to_currency: pair.to.code().to_string(),
        };

        let response: proto::ExchangeRateResponse = self
            .unary(GET_RATE_PATH, request)
            .await
            .map_err(|s| map_status(s, Some(*pair)))?;

        Ok(response.rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxwallet_common::Currency;

    #[test]
    fn test_not_found_maps_to_missing_rate() {
        let pair = CurrencyPair::new(Currency::Eur, Currency::Rub);
        let err = map_status(Status::not_found("no such pair"), Some(pair));

        assert!(matches!(err, FxError::RateNotAvailable(p) if p == pair));
    }

    #[test]
    fn test_transport_failures_map_to_unavailable() {
        for status in [
            Status::unavailable("down"),
            Status::deadline_exceeded("slow"),
        ] {
            assert!(matches!(
                map_status(status, None),
                FxError::ProviderUnavailable(_)
            ));
        }
    }

    #[test]
    fn test_other_statuses_map_to_provider_error() {
        let err = map_status(Status::internal("boom"), None);
        assert!(matches!(err, FxError::ProviderError(msg) if msg.contains("boom")));
    }

    #[test]
    fn test_invalid_endpoint_is_rejected() {
        let result = GrpcRateProvider::connect_lazy("not a uri", Duration::from_secs(1));
        assert!(matches!(result, Err(FxError::InvalidEndpoint(_))));
    }

    #[tokio::test]
    async fn test_lazy_connect_does_not_dial() {
        let provider =
            GrpcRateProvider::connect_lazy("http://127.0.0.1:50051", Duration::from_millis(50));
        assert!(provider.is_ok());
    }
}
