use std::time::Duration;

use time::UtcOffset;
use tracing::debug;

use crate::domain::item::SchedulableItem;
use crate::domain::kind::ItemKind;
use crate::domain::status::ItemStatus;

use super::rows::parse_listing;
use super::{ItemSource, SourceError, StatusWriter};

/// The agenda REST backend, for one item kind.
#[derive(Clone)]
pub struct HttpBackend {
    agent: ureq::Agent,
    kind: ItemKind,
    base_url: String,
    session_cookie: Option<String>,
    utc_offset: UtcOffset,
}

impl HttpBackend {
    pub fn new(
        kind: ItemKind,
        base_url: &str,
        timeout: Duration,
        session_cookie: Option<String>,
        utc_offset: UtcOffset,
    ) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build()
            .new_agent();
        Self {
            agent,
            kind,
            base_url: base_url.trim_end_matches('/').to_string(),
            session_cookie,
            utc_offset,
        }
    }

    pub fn list_url(&self) -> String {
        match self.kind {
            ItemKind::Appointment => format!(
                "{}/{}?estado={},{}",
                self.base_url,
                self.kind.collection(),
                ItemStatus::Pending.backend_tag(),
                ItemStatus::Active.backend_tag()
            ),
            ItemKind::Event => format!("{}/{}?estado=Todos", self.base_url, self.kind.collection()),
        }
    }

    pub fn status_url(&self, id: &str) -> String {
        format!("{}/{}/{}/estado", self.base_url, self.kind.collection(), id)
    }
}

impl ItemSource for HttpBackend {
    fn fetch_eligible_items(&self) -> Result<Vec<SchedulableItem>, SourceError> {
        let url = self.list_url();
        let mut request = self.agent.get(&url).header("Accept", "application/json");
        if let Some(cookie) = self.session_cookie.as_deref() {
            request = request.header("Cookie", cookie);
        }
        let mut response = request.call()?;
        let body = response.body_mut().read_to_string()?;

        let items = parse_listing(self.kind, &body, self.utc_offset)?
            .into_iter()
            .filter(|item| item.status.is_eligible())
            .collect::<Vec<_>>();
        debug!(kind = self.kind.as_str(), count = items.len(), "fetched items");
        Ok(items)
    }
}

impl StatusWriter for HttpBackend {
    fn set_status(&self, id: &str, status: ItemStatus) -> Result<(), SourceError> {
        let url = self.status_url(id);
        let payload = serde_json::json!({ "estado": status.backend_tag() });
        let mut request = self
            .agent
            .patch(&url)
            .header("Content-Type", "application/json");
        if let Some(cookie) = self.session_cookie.as_deref() {
            request = request.header("Cookie", cookie);
        }
        request.send(payload.to_string())?;
        Ok(())
    }
}
