//! Append-only tracking history of a shipment.

use freight_types::TrackingEvent;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Journal {
    events: Vec<TrackingEvent>,
}

impl Journal {
    pub(crate) fn from_events(events: Vec<TrackingEvent>) -> Self {
        Journal { events }
    }

    /// Only called together with a ledger or status transition.
    pub(crate) fn append(&mut self, event: TrackingEvent) {
        self.events.push(event);
    }

    /// Events in chronological (insertion) order
    pub fn events(&self) -> &[TrackingEvent] {
        &self.events
    }

    /// Newest first, for display
    pub fn newest_first(&self) -> impl Iterator<Item = &TrackingEvent> {
        self.events.iter().rev()
    }

    pub fn latest(&self) -> Option<&TrackingEvent> {
        self.events.last()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// Event texts, as shown to shippers and drivers
pub(crate) mod messages {
    pub fn loading_started() -> String {
        "Carregamento iniciado.".to_string()
    }

    pub fn in_transit(next: Option<&str>) -> String {
        match next {
            Some(stop) => format!("Em trânsito para {stop}."),
            None => "Em trânsito.".to_string(),
        }
    }

    pub fn delivered(stop: &str) -> String {
        format!("Entrega em {stop} foi concluída.")
    }

    pub fn not_delivered(stop: &str, reason: &str, next: Option<&str>) -> String {
        let mut msg = format!("Entrega em {stop} não foi concluída: {reason}.");
        if let Some(next) = next {
            msg.push_str(&format!(" Em trânsito para {next}."));
        }
        msg
    }

    pub fn finalized(delivered: usize, failed: usize) -> String {
        if failed == 0 {
            format!("Frete finalizado. {delivered} entrega(s) concluída(s).")
        } else {
            format!(
                "Frete finalizado. {delivered} entrega(s) concluída(s), {failed} não concluída(s)."
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use freight_types::{Actor, TechnicalStatus};

    fn event(msg: &str) -> TrackingEvent {
        TrackingEvent::new(
            TechnicalStatus::InTransit,
            msg,
            &Actor::new("drv-1", "Carlos"),
            Utc::now(),
        )
    }

    #[test]
    fn events_keep_insertion_order() {
        let mut journal = Journal::default();
        journal.append(event("first"));
        journal.append(event("second"));
        let msgs: Vec<_> = journal.events().iter().map(|e| e.message.as_str()).collect();
        assert_eq!(msgs, ["first", "second"]);
        let newest: Vec<_> = journal.newest_first().map(|e| e.message.as_str()).collect();
        assert_eq!(newest, ["second", "first"]);
        assert_eq!(journal.latest().unwrap().message, "second");
        // the reversed view does not touch the stored order
        assert_eq!(journal.events()[0].message, "first");
    }

    #[test]
    fn message_texts() {
        assert_eq!(messages::in_transit(Some("B/MG")), "Em trânsito para B/MG.");
        assert_eq!(messages::in_transit(None), "Em trânsito.");
        assert_eq!(messages::delivered("A/SP"), "Entrega em A/SP foi concluída.");
        assert_eq!(
            messages::not_delivered("B/MG", "avaria", Some("C/RJ")),
            "Entrega em B/MG não foi concluída: avaria. Em trânsito para C/RJ."
        );
        assert!(messages::finalized(2, 1).starts_with("Frete finalizado."));
    }
}
