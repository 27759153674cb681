//! A smart-HTTP remote: ref discovery, fetch negotiation and push.

use git_hash::ObjectId;
use git_object::ObjectType;
use git_odb::ObjectStore;
use git_pack::{CancellationToken, PackReader};
use git_transport::{send_checked, HttpClient, HttpRequest, RemoteUrl, Service};
use tracing::debug;

use crate::advertise::RefAdvertisement;
use crate::fetch::{self, FetchOutcome, FetchRequest, FetchedPack};
use crate::push::{self, RefUpdate};
use crate::ProtocolError;

/// Commits offered per negotiation round after a `NAK`.
pub const NEGOTIATION_BATCH: usize = 32;

pub struct SmartHttpRemote<C> {
    client: C,
    url: RemoteUrl,
}

impl<C: HttpClient> SmartHttpRemote<C> {
    pub fn new(client: C, url: &str) -> Result<Self, ProtocolError> {
        Ok(Self {
            client,
            url: RemoteUrl::parse(url)?,
        })
    }

    pub fn url(&self) -> &RemoteUrl {
        &self.url
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Refs advertised by `git-upload-pack`, including `HEAD`.
    pub fn fetch_refs(&self) -> Result<RefAdvertisement, ProtocolError> {
        self.discover(Service::UploadPack)
    }

    /// Refs advertised by `git-receive-pack`.
    pub fn fetch_receive_refs(&self) -> Result<RefAdvertisement, ProtocolError> {
        self.discover(Service::ReceivePack)
    }

    fn discover(&self, service: Service) -> Result<RefAdvertisement, ProtocolError> {
        let url = self.url.info_refs(service);
        let body = send_checked(&self.client, &HttpRequest::get(url))?;
        let adv = RefAdvertisement::parse(&body, service)?;
        debug!(service = service.as_str(), refs = adv.refs.len(), "discovered refs");
        Ok(adv)
    }

    /// Negotiate and download a pack for `request.wants`.
    ///
    /// `frontier` holds the parents just past `request.haves`. While the
    /// server answers `NAK` the next [`NEGOTIATION_BATCH`] commits behind the
    /// frontier are offered; once nothing older is left the result is
    /// [`FetchOutcome::NoCommon`]. The pack may be thin: bases it omits are
    /// looked up in `store`.
    pub fn fetch_ref(
        &self,
        mut request: FetchRequest,
        mut frontier: Vec<ObjectId>,
        store: &ObjectStore,
        cancel: &CancellationToken,
        progress: &mut dyn FnMut(&str),
    ) -> Result<FetchOutcome, ProtocolError> {
        let endpoint = self.url.service_endpoint(Service::UploadPack);
        let mut round = 0usize;

        loop {
            cancel.check()?;
            round += 1;
            request.more_haves = !request.haves.is_empty() && !frontier.is_empty();
            debug!(
                round,
                wants = request.wants.len(),
                haves = request.haves.len(),
                more = request.more_haves,
                "upload-pack round"
            );

            let http = HttpRequest::post(
                endpoint.clone(),
                Service::UploadPack.request_content_type(),
                request.encode()?,
            );
            let body = send_checked(&self.client, &http)?;

            if !request.haves.is_empty() && fetch::is_nak(&body) {
                if frontier.is_empty() {
                    debug!(round, "no common history");
                    return Ok(FetchOutcome::NoCommon);
                }
                let graph = store.commit_graph(&frontier, NEGOTIATION_BATCH)?;
                if graph.commits.is_empty() {
                    debug!(round, "history ends before any common commit");
                    return Ok(FetchOutcome::NoCommon);
                }
                request.haves = graph.commits.iter().map(|c| c.oid).collect();
                frontier = graph.frontier;
                continue;
            }

            let response = fetch::parse_response(&body, progress)?;
            let resolver = |oid: &ObjectId| -> Option<(ObjectType, Vec<u8>)> { store.resolve_base(oid) };
            let parsed = PackReader::new(&response.pack)?.parse_all(&resolver, cancel)?;
            debug!(
                objects = parsed.objects.len(),
                bytes = response.pack.len(),
                common = response.common.len(),
                "received pack"
            );
            return Ok(FetchOutcome::Pack(FetchedPack {
                data: response.pack,
                parsed,
                common: response.common,
                shallow: response.shallow,
            }));
        }
    }

    /// Send `updates` with `pack` to receive-pack.
    pub fn push_refs(
        &self,
        updates: &[RefUpdate],
        pack: &[u8],
        progress: &mut dyn FnMut(&str),
    ) -> Result<(), ProtocolError> {
        let body = push::encode_request(updates, pack)?;
        let http = HttpRequest::post(
            self.url.service_endpoint(Service::ReceivePack),
            Service::ReceivePack.request_content_type(),
            body,
        );
        progress("Sending objects");
        debug!(updates = updates.len(), pack_bytes = pack.len(), "pushing");
        let response = send_checked(&self.client, &http)?;
        push::check_response(&response)
    }
}
