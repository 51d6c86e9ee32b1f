//! Difusión de eventos del ciclo de vida
//!
//! Registro explícito de suscriptores (uno por conexión SSE). Cada suscriptor
//! tiene una cola acotada; un suscriptor lleno o cerrado nunca bloquea al
//! productor. Entrega a lo más una vez, sin replay.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use dashmap::DashMap;
use futures::Stream;
use serde_json::{json, Value};
use tokio::sync::mpsc::{self, error::TrySendError};

use crate::models::quote::Quote;

pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 64;

/// Tipos de evento publicados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
    Approved,
    Rejected,
    NeedsReview,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Created => "quote.created",
            EventKind::Updated => "quote.updated",
            EventKind::Deleted => "quote.deleted",
            EventKind::Approved => "quote.approved",
            EventKind::Rejected => "quote.rejected",
            EventKind::NeedsReview => "quote.needsReview",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LifecycleEvent {
    pub kind: EventKind,
    pub payload: Value,
}

impl LifecycleEvent {
    /// Evento con `{reference, file, state, client, total, currency, savedAt}`
    pub fn for_quote(kind: EventKind, quote: &Quote) -> Self {
        Self {
            kind,
            payload: json!({
                "reference": quote.reference,
                "file": quote.file_name(),
                "state": quote.state().as_str(),
                "client": quote.client,
                "total": quote.total,
                "currency": quote.currency.code(),
                "savedAt": quote.saved_at,
            }),
        }
    }

    pub fn deleted(reference: &str) -> Self {
        Self {
            kind: EventKind::Deleted,
            payload: json!({
                "reference": reference,
                "file": format!("{}.json", reference),
                "state": "deleted",
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}

struct HubInner {
    subscribers: DashMap<u64, mpsc::Sender<LifecycleEvent>>,
    next_id: AtomicU64,
    capacity: usize,
}

/// Registro de suscriptores; se clona barato y se inyecta donde se necesite
#[derive(Clone)]
pub struct EventHub {
    inner: Arc<HubInner>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_SUBSCRIBER_CAPACITY)
    }
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Arc::new(HubInner {
                subscribers: DashMap::new(),
                next_id: AtomicU64::new(1),
                capacity: capacity.max(1),
            }),
        }
    }

    /// Registrar un suscriptor nuevo
    pub fn add(&self) -> Subscription {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(self.inner.capacity);
        self.inner.subscribers.insert(id, sender);

        log::debug!("📡 Suscriptor {} conectado ({} activos)", id, self.subscriber_count());
        Subscription {
            id,
            hub: self.clone(),
            receiver,
        }
    }

    pub fn remove(&self, id: u64) -> bool {
        let removed = self.inner.subscribers.remove(&id).is_some();
        if removed {
            log::debug!("📡 Suscriptor {} desconectado", id);
        }
        removed
    }

    /// Enviar a todos sin bloquear; devuelve cuántos lo recibieron
    pub fn broadcast(&self, event: LifecycleEvent) -> usize {
        let mut delivered = 0;
        let mut closed = Vec::new();

        for entry in self.inner.subscribers.iter() {
            match entry.value().try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    log::warn!("⚠️ Suscriptor {} saturado, evento {} descartado", entry.key(), event.name());
                }
                Err(TrySendError::Closed(_)) => closed.push(*entry.key()),
            }
        }

        // Fuera del iterador para no bloquear el shard
        for id in closed {
            self.inner.subscribers.remove(&id);
        }

        log::info!("📣 {} entregado a {} suscriptor(es)", event.name(), delivered);
        delivered
    }

    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.len()
    }

    /// Cerrar todas las suscripciones (apagado del servidor)
    pub fn clear(&self) {
        let count = self.subscriber_count();
        self.inner.subscribers.clear();
        log::info!("📡 {} suscripciones cerradas", count);
    }
}

/// Suscripción viva; al soltarla se elimina del registro
pub struct Subscription {
    id: u64,
    hub: EventHub,
    receiver: mpsc::Receiver<LifecycleEvent>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub async fn recv(&mut self) -> Option<LifecycleEvent> {
        self.receiver.recv().await
    }
}

impl Stream for Subscription {
    type Item = LifecycleEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.receiver.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.remove(self.id);
    }
}
