use bytes::{Buf, BufMut, Bytes, BytesMut};
use kafka_protocol::messages::*;
use kafka_protocol::protocol::buf::ByteBuf;
use kafka_protocol::protocol::{Decodable, Encodable, StrBytes, VersionRange};
use log::debug;

/// Ties a request body to the response body the protocol defines for it.
///
/// The mapping is closed: every implementor names exactly one `RequestKind`
/// variant and one `ResponseKind` variant, and a transport that answers a
/// request with any other variant is broken.
pub trait BrokerRequest: Send + 'static {
    type Response: Send + 'static;

    const API_KEY: ApiKey;

    fn into_kind(self) -> RequestKind;

    /// Unwraps the matching response variant, handing back anything else.
    fn response_from(kind: ResponseKind) -> Result<Self::Response, ResponseKind>;
}

macro_rules! broker_requests {
    ($($variant:ident: $request:ty => $response:ty),* $(,)?) => {
        $(
            impl BrokerRequest for $request {
                type Response = $response;

                const API_KEY: ApiKey = ApiKey::$variant;

                fn into_kind(self) -> RequestKind {
                    RequestKind::$variant(self)
                }

                fn response_from(kind: ResponseKind) -> Result<$response, ResponseKind> {
                    match kind {
                        ResponseKind::$variant(response) => Ok(response),
                        other => Err(other),
                    }
                }
            }
        )*
    };
}

broker_requests! {
    ApiVersions: ApiVersionsRequest => ApiVersionsResponse,
    ElectLeaders: ElectLeadersRequest => ElectLeadersResponse,
}

#[inline]
fn is_valid_version(version: i16, range: &VersionRange) -> bool {
    version >= range.min && version <= range.max
}

/// Prepends the 4 byte size field Kafka frames carry.
fn put_sized(buffer: &mut BytesMut, body: &[u8]) -> Result<(), anyhow::Error> {
    buffer.put_i32(i32::try_from(body.len())?);
    buffer.put_slice(body);
    Ok(())
}

// A request as it travels to a broker: header plus typed body
#[derive(Debug)]
pub struct RequestFrame {
    pub header: RequestHeader,
    pub api_key: ApiKey,
    pub request: RequestKind,
}

impl RequestFrame {
    pub fn new(
        api_key: ApiKey,
        api_version: i16,
        correlation_id: i32,
        client_id: &str,
        request: RequestKind,
    ) -> Self {
        let header = RequestHeader::default()
            .with_request_api_key(api_key as i16)
            .with_request_api_version(api_version)
            .with_correlation_id(correlation_id)
            .with_client_id(Some(StrBytes::from_string(client_id.to_string())));
        Self { header, api_key, request }
    }

    pub fn api_version(&self) -> i16 {
        self.header.request_api_version
    }

    pub fn correlation_id(&self) -> i32 {
        self.header.correlation_id
    }

    /// Encodes the size field, header and body into `buffer`.
    pub fn encode(&self, buffer: &mut BytesMut) -> Result<(), anyhow::Error> {
        let api_version = self.api_version();
        let header_version = self.api_key.request_header_version(api_version);

        let mut body = BytesMut::new();
        self.header.encode(&mut body, header_version)?;
        self.request.encode(&mut body, api_version)?;
        debug!(
            "Encoded {:?} v{} request, correlation_id={}, {} bytes",
            self.api_key,
            api_version,
            self.header.correlation_id,
            body.len()
        );

        put_sized(buffer, &body)
    }

    /// Decodes a frame whose size field has already been consumed.
    pub fn decode(data: &mut Bytes) -> Result<Self, anyhow::Error> {
        if data.len() < 4 {
            return Err(anyhow::anyhow!("Request too short: {} bytes", data.len()));
        }

        let api_key = ApiKey::try_from(data.peek_bytes(0..2).get_i16())
            .map_err(|_| anyhow::anyhow!("Invalid API key"))?;
        let api_version = data.peek_bytes(2..4).get_i16();
        if !is_valid_version(api_version, &api_key.valid_versions()) {
            return Err(anyhow::anyhow!("Invalid API version {} for {:?}", api_version, api_key));
        }
        let header_version = api_key.request_header_version(api_version);
        let header = RequestHeader::decode(data, header_version)?;
        debug!("Decoded request header with correlation_id: {}", header.correlation_id);

        let request = RequestKind::decode(api_key, data, api_version)?;
        Ok(RequestFrame { header, api_key, request })
    }
}

// A broker's reply, decoded against the request it answers
#[derive(Debug)]
pub struct ResponseFrame {
    pub header: ResponseHeader,
    pub api_key: ApiKey,
    pub api_version: i16,
    pub response: ResponseKind,
}

impl ResponseFrame {
    pub fn new(api_key: ApiKey, api_version: i16, correlation_id: i32, response: ResponseKind) -> Self {
        Self {
            header: ResponseHeader::default().with_correlation_id(correlation_id),
            api_key,
            api_version,
            response,
        }
    }

    /// Builds the reply to `request`, echoing its correlation id and version.
    pub fn answering(request: &RequestFrame, response: ResponseKind) -> Self {
        Self::new(request.api_key, request.api_version(), request.correlation_id(), response)
    }

    pub fn correlation_id(&self) -> i32 {
        self.header.correlation_id
    }

    pub fn encode(&self, buffer: &mut BytesMut) -> Result<(), anyhow::Error> {
        let response_header_version = self.api_key.response_header_version(self.api_version);

        let mut body = BytesMut::new();
        self.header.encode(&mut body, response_header_version)?;
        self.response.encode(&mut body, self.api_version)?;

        put_sized(buffer, &body)
    }

    /// Decodes a frame whose size field has already been consumed. The API key
    /// and version are not on the wire; they come from the request being
    /// answered.
    pub fn decode(api_key: ApiKey, api_version: i16, data: &mut Bytes) -> Result<Self, anyhow::Error> {
        let response_header_version = api_key.response_header_version(api_version);
        let header = ResponseHeader::decode(data, response_header_version)?;
        debug!(
            "Decoding {:?} v{} response, correlation_id={}, {} bytes left",
            api_key,
            api_version,
            header.correlation_id,
            data.remaining()
        );

        let response = ResponseKind::decode(api_key, data, api_version)?;
        Ok(ResponseFrame { header, api_key, api_version, response })
    }
}
