use std::fmt;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::time::Duration;

use tracing::{debug, info, instrument};
use url::Url;

use crate::metainfo::Metainfo;
use crate::{BencodeType, Error, Result, HASH_LEN};

const INTERVAL_KEY: &str = "interval";
const PEERS_KEY: &str = "peers";
const FAILURE_REASON_KEY: &str = "failure reason";
const COMPACT_PEER_LEN: usize = 6;

/// Encode every byte as `%xx`, including unreserved characters
fn percent_encode_all(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("%{:02x}", byte))
        .collect::<Vec<String>>()
        .join("")
}

/// GET request to tracker
#[derive(Debug)]
pub struct Request {
    /// URL to make GET request to tracker
    pub url: Url,
}

impl Request {
    /// Create request
    pub fn new(
        tracker_url: &str,
        peer_id: &[u8; HASH_LEN],
        port: u16,
        info_hash: &[u8; HASH_LEN],
        file_length: u64,
    ) -> Result<Request> {
        let separator = if tracker_url.contains('?') { '&' } else { '?' };
        let string_url = format!(
            "{}{}info_hash={}&peer_id={}",
            tracker_url,
            separator,
            percent_encode_all(info_hash),
            percent_encode_all(peer_id),
        );
        let mut url = Url::parse(&string_url).map_err(|e| {
            Error::TrackerUnreachable(format!("invalid announce URL {}: {}", tracker_url, e))
        })?;
        url.query_pairs_mut()
            .append_pair("port", &port.to_string())
            .append_pair("uploaded", "0")
            .append_pair("downloaded", "0")
            .append_pair("left", &file_length.to_string())
            .append_pair("compact", "1");
        Ok(Request { url })
    }

    /// Send request and return response body
    pub async fn send(self, deadline: Duration) -> Result<Vec<u8>> {
        let exchange = async move {
            let response = reqwest::get(self.url)
                .await
                .map_err(|e| Error::TrackerUnreachable(e.to_string()))?;
            let status = response.status();
            if !status.is_success() {
                return Err(Error::TrackerRejected(format!("HTTP status {}", status)));
            }
            let body = response
                .bytes()
                .await
                .map_err(|e| Error::TrackerUnreachable(e.to_string()))?;
            Ok::<_, Error>(body.to_vec())
        };
        tokio::time::timeout(deadline, exchange)
            .await
            .map_err(|_| Error::TrackerUnreachable(format!("no response within {:?}", deadline)))?
    }
}

/// Successful response from tracker
#[derive(Debug, PartialEq)]
pub struct Response {
    /// Interval (in seconds) at which to reconnect to tracker to refresh peer list
    pub interval: Option<u64>,
    /// Peers of file reported by tracker
    pub peers: Vec<Peer>,
}

impl Response {
    /// Deserialise response message body
    pub fn deserialise(data: &[u8]) -> Result<Response> {
        let decoded = crate::decode::decode(data)?;
        if !matches!(decoded, BencodeType::Dict(_)) {
            return Err(Error::TrackerRejected(
                "response is not a bencoded dict".to_string(),
            ));
        }
        if let Some(reason) = decoded.get(FAILURE_REASON_KEY) {
            let reason = reason
                .as_bytes()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_else(|| "unspecified failure".to_string());
            return Err(Error::TrackerRejected(reason));
        }

        let interval = decoded
            .get(INTERVAL_KEY)
            .and_then(BencodeType::as_integer)
            .and_then(|int| u64::try_from(int).ok());
        let peer_data = decoded
            .get(PEERS_KEY)
            .and_then(BencodeType::as_bytes)
            .ok_or_else(|| Error::TrackerRejected("response has no compact peers".to_string()))?;
        let peers = Self::parse_peers(peer_data)?;
        Ok(Response { interval, peers })
    }

    /// Parse peers encoded in "compact" form
    fn parse_peers(data: &[u8]) -> Result<Vec<Peer>> {
        if data.len() % COMPACT_PEER_LEN != 0 {
            return Err(Error::MalformedPeerList(data.len()));
        }
        Ok(data.chunks_exact(COMPACT_PEER_LEN).map(Peer::new).collect())
    }
}

/// Peer of file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Peer {
    /// IP address of peer
    pub ip: Ipv4Addr,
    /// Port of peer
    pub port: u16,
}

impl Peer {
    /// Create from a 6 byte compact entry
    fn new(data: &[u8]) -> Peer {
        Peer {
            ip: Ipv4Addr::new(data[0], data[1], data[2], data[3]),
            port: u16::from_be_bytes([data[4], data[5]]),
        }
    }

    pub fn socket_addr(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.ip, self.port)
    }
}

impl From<SocketAddrV4> for Peer {
    fn from(addr: SocketAddrV4) -> Peer {
        Peer {
            ip: *addr.ip(),
            port: addr.port(),
        }
    }
}

impl fmt::Display for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}

/// Announce to the tracker in `metainfo` and return the peers it reports
#[instrument(skip(metainfo, peer_id), fields(tracker = %metainfo.announce))]
pub async fn announce(
    metainfo: &Metainfo,
    peer_id: &[u8; HASH_LEN],
    port: u16,
    deadline: Duration,
) -> Result<Response> {
    let request = Request::new(
        &metainfo.announce,
        peer_id,
        port,
        &metainfo.info_hash,
        metainfo.info.length,
    )?;
    debug!("Sending tracker request: {}", request.url);
    let body = request.send(deadline).await?;
    let response = Response::deserialise(&body)?;
    info!("Tracker returned {} peers", response.peers.len());
    Ok(response)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use mockito::Matcher::UrlEncoded;

    use super::*;
    use crate::encode::encode;

    const PEER_ID: &[u8; HASH_LEN] = b"-ABC123-abcd12345678";
    const DEADLINE: Duration = Duration::from_secs(5);

    fn info_hash() -> [u8; HASH_LEN] {
        let mut hash = [0; HASH_LEN];
        for (idx, byte) in hash.iter_mut().enumerate() {
            *byte = idx as u8;
        }
        hash
    }

    fn compact_peers() -> Vec<u8> {
        let peer_one_ip = [0xC0, 0x00, 0x02, 0x7B]; // 192.0.2.123
        let peer_two_ip = [0xC0, 0x00, 0x02, 0x7C]; // 192.0.2.124
        let port_bytes_network_order = [0x1A, 0xE1]; // 6881
        let mut peers_data = Vec::new();
        for ip in [peer_one_ip, peer_two_ip] {
            peers_data.extend_from_slice(&ip);
            peers_data.extend_from_slice(&port_bytes_network_order);
        }
        peers_data
    }

    fn response_body(entries: Vec<(&str, BencodeType)>) -> Vec<u8> {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key.as_bytes().to_vec(), value))
            .collect::<BTreeMap<_, _>>();
        encode(&BencodeType::Dict(map))
    }

    fn query_matcher(file_length: u64) -> mockito::Matcher {
        mockito::Matcher::AllOf(vec![
            mockito::Matcher::Regex(format!("info_hash={}", percent_encode_all(&info_hash()))),
            UrlEncoded("peer_id".to_string(), "-ABC123-abcd12345678".to_string()),
            UrlEncoded("port".to_string(), "6881".to_string()),
            UrlEncoded("uploaded".to_string(), "0".to_string()),
            UrlEncoded("downloaded".to_string(), "0".to_string()),
            UrlEncoded("compact".to_string(), "1".to_string()),
            UrlEncoded("left".to_string(), file_length.to_string()),
        ])
    }

    #[test]
    fn parse_peer() {
        let data = [0xC0, 0x00, 0x02, 0x7B, 0x1A, 0xE1];
        let expected_peer = Peer {
            ip: Ipv4Addr::new(192, 0, 2, 123),
            port: 6881,
        };
        assert_eq!(Peer::new(&data), expected_peer);
        assert_eq!(expected_peer.to_string(), "192.0.2.123:6881");
    }

    #[test]
    fn create_response_from_successful_tracker_body() {
        let body = response_body(vec![
            ("interval", BencodeType::Integer(900)),
            ("peers", BencodeType::ByteString(compact_peers())),
        ]);
        let response = Response::deserialise(&body).unwrap();
        assert_eq!(response.interval, Some(900));
        assert_eq!(
            response.peers,
            vec![
                Peer {
                    ip: Ipv4Addr::new(192, 0, 2, 123),
                    port: 6881
                },
                Peer {
                    ip: Ipv4Addr::new(192, 0, 2, 124),
                    port: 6881
                },
            ]
        );
    }

    #[test]
    fn big_endian_port_is_decoded() {
        let body = response_body(vec![(
            "peers",
            BencodeType::ByteString(vec![10, 0, 0, 1, 0x01, 0x02]),
        )]);
        let response = Response::deserialise(&body).unwrap();
        assert_eq!(response.interval, None);
        assert_eq!(response.peers[0].port, 0x0102);
        assert_eq!(response.peers[0].ip, Ipv4Addr::new(10, 0, 0, 1));
    }

    #[test]
    fn create_error_from_failure_response() {
        let value = "Some reason for query failure";
        let body = response_body(vec![("failure reason", BencodeType::from(value))]);
        let res = Response::deserialise(&body);
        assert!(matches!(res, Err(Error::TrackerRejected(msg)) if msg == value));
    }

    #[test]
    fn missing_peers_is_rejection() {
        let body = response_body(vec![("interval", BencodeType::Integer(900))]);
        let res = Response::deserialise(&body);
        assert!(matches!(res, Err(Error::TrackerRejected(_))));
    }

    #[test]
    fn peers_not_multiple_of_six_is_malformed() {
        let body = response_body(vec![("peers", BencodeType::ByteString(vec![0; 7]))]);
        let res = Response::deserialise(&body);
        assert!(matches!(res, Err(Error::MalformedPeerList(7))));
    }

    #[test]
    fn malformed_body_surfaces_codec_error() {
        let res = Response::deserialise(b"d8:intervali900e");
        assert!(matches!(res, Err(Error::MalformedEncoding { .. })));
    }

    #[test]
    fn creating_tracker_request_produces_expected_url_for_get_request() {
        let tracker_url = "http://a.b.org:1234/announce";
        let request = Request::new(tracker_url, PEER_ID, 6881, &info_hash(), 128).unwrap();
        let expected = format!(
            "{}?info_hash={}&peer_id={}&port=6881&uploaded=0&downloaded=0&left=128&compact=1",
            tracker_url,
            percent_encode_all(&info_hash()),
            percent_encode_all(PEER_ID),
        );
        assert_eq!(request.url.as_str(), expected);
    }

    #[test]
    fn every_info_hash_byte_is_percent_encoded() {
        let hash = *b"abcdefghij0123456789";
        let request = Request::new("http://a.b.org/announce", PEER_ID, 6881, &hash, 1).unwrap();
        assert!(request
            .url
            .as_str()
            .contains("info_hash=%61%62%63%64%65%66%67%68%69%6a%30%31%32%33%34%35%36%37%38%39"));
    }

    #[test]
    fn announce_url_with_existing_query_is_extended() {
        let request = Request::new(
            "http://a.b.org/announce?passkey=abc",
            PEER_ID,
            6881,
            &info_hash(),
            1,
        )
        .unwrap();
        assert_eq!(request.url.query_pairs().next().unwrap().1, "abc");
        assert!(request.url.as_str().contains("passkey=abc&info_hash=%00%01"));
    }

    #[test]
    fn invalid_announce_url_is_unreachable() {
        let res = Request::new("not a url", PEER_ID, 6881, &info_hash(), 1);
        assert!(matches!(res, Err(Error::TrackerUnreachable(_))));
    }

    #[tokio::test]
    async fn sent_request_returns_response_body() {
        let body = response_body(vec![
            ("interval", BencodeType::Integer(900)),
            ("peers", BencodeType::ByteString(compact_peers())),
        ]);
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/")
            .match_query(query_matcher(128))
            .with_body(body.clone())
            .create_async()
            .await;
        let response = Request::new(&server.url(), PEER_ID, 6881, &info_hash(), 128)
            .unwrap()
            .send(DEADLINE)
            .await
            .unwrap();
        mock.assert_async().await;
        assert_eq!(response, body);
    }

    #[tokio::test]
    async fn error_status_is_rejection() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .match_query(mockito::Matcher::Any)
            .with_status(500)
            .create_async()
            .await;
        let res = Request::new(&server.url(), PEER_ID, 6881, &info_hash(), 128)
            .unwrap()
            .send(DEADLINE)
            .await;
        assert!(matches!(res, Err(Error::TrackerRejected(_))));
    }

    #[tokio::test]
    async fn refused_connection_is_unreachable() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let res = Request::new(&format!("http://{}/", addr), PEER_ID, 6881, &info_hash(), 1)
            .unwrap()
            .send(DEADLINE)
            .await;
        assert!(matches!(res, Err(Error::TrackerUnreachable(_))));
    }

    #[tokio::test]
    async fn silent_tracker_times_out_as_unreachable() {
        // Accepted by the OS backlog but never answered
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let res = Request::new(&format!("http://{}/", addr), PEER_ID, 6881, &info_hash(), 1)
            .unwrap()
            .send(Duration::from_millis(200))
            .await;
        assert!(matches!(res, Err(Error::TrackerUnreachable(_))));
        drop(listener);
    }

    #[tokio::test]
    async fn announce_returns_peers_from_tracker() {
        let mut server = mockito::Server::new_async().await;
        let mut info = BTreeMap::new();
        info.insert(b"name".to_vec(), BencodeType::from("file"));
        info.insert(b"length".to_vec(), BencodeType::Integer(128));
        info.insert(b"piece length".to_vec(), BencodeType::Integer(64));
        info.insert(b"pieces".to_vec(), BencodeType::ByteString(vec![0xab; 40]));
        let mut torrent = BTreeMap::new();
        torrent.insert(b"announce".to_vec(), BencodeType::from(server.url().as_str()));
        torrent.insert(b"info".to_vec(), BencodeType::Dict(info));
        let metainfo = Metainfo::new(&BencodeType::Dict(torrent)).unwrap();

        let mock = server
            .mock("GET", "/")
            .match_query(mockito::Matcher::AllOf(vec![
                mockito::Matcher::Regex(format!(
                    "info_hash={}",
                    percent_encode_all(&metainfo.info_hash)
                )),
                UrlEncoded("left".to_string(), "128".to_string()),
                UrlEncoded("compact".to_string(), "1".to_string()),
            ]))
            .with_body(response_body(vec![
                ("interval", BencodeType::Integer(900)),
                ("peers", BencodeType::ByteString(compact_peers())),
            ]))
            .create_async()
            .await;

        let response = announce(&metainfo, PEER_ID, 6881, DEADLINE).await.unwrap();
        mock.assert_async().await;
        assert_eq!(response.peers.len(), 2);
        assert_eq!(response.peers[1].to_string(), "192.0.2.124:6881");
    }
}
