use std::{future::Future, pin::Pin, sync::Arc};

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderViewComputedEvent,
    PayoutDocumentCreatedEvent,
    PayoutStatusChangedEvent,
    ReportStatusChangedEvent,
};

type HookFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Cloneable fan-out handles held by the API objects. Publishing to an empty list is a no-op.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub order_view_producer: Vec<EventProducer<OrderViewComputedEvent>>,
    pub report_status_producer: Vec<EventProducer<ReportStatusChangedEvent>>,
    pub payout_created_producer: Vec<EventProducer<PayoutDocumentCreatedEvent>>,
    pub payout_status_producer: Vec<EventProducer<PayoutStatusChangedEvent>>,
}

impl EventProducers {
    pub async fn order_view_computed(&self, event: OrderViewComputedEvent) {
        for producer in &self.order_view_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn report_status_changed(&self, event: ReportStatusChangedEvent) {
        for producer in &self.report_status_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn payout_created(&self, event: PayoutDocumentCreatedEvent) {
        for producer in &self.payout_created_producer {
            producer.publish_event(event.clone()).await;
        }
    }

    pub async fn payout_status_changed(&self, event: PayoutStatusChangedEvent) {
        for producer in &self.payout_status_producer {
            producer.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_order_view_computed: Option<EventHandler<OrderViewComputedEvent>>,
    pub on_report_status_changed: Option<EventHandler<ReportStatusChangedEvent>>,
    pub on_payout_created: Option<EventHandler<PayoutDocumentCreatedEvent>>,
    pub on_payout_status_changed: Option<EventHandler<PayoutStatusChangedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_order_view_computed: hooks.on_order_view_computed.map(|f| EventHandler::new(buffer_size, f)),
            on_report_status_changed: hooks.on_report_status_changed.map(|f| EventHandler::new(buffer_size, f)),
            on_payout_created: hooks.on_payout_created.map(|f| EventHandler::new(buffer_size, f)),
            on_payout_status_changed: hooks.on_payout_status_changed.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_order_view_computed {
            result.order_view_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_report_status_changed {
            result.report_status_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_created {
            result.payout_created_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payout_status_changed {
            result.payout_status_producer.push(handler.subscribe());
        }
        result
    }

    pub async fn start_handlers(self) {
        if let Some(handler) = self.on_order_view_computed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_report_status_changed {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_created {
            tokio::spawn(handler.start_handler());
        }
        if let Some(handler) = self.on_payout_status_changed {
            tokio::spawn(handler.start_handler());
        }
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_order_view_computed: Option<Handler<OrderViewComputedEvent>>,
    pub on_report_status_changed: Option<Handler<ReportStatusChangedEvent>>,
    pub on_payout_created: Option<Handler<PayoutDocumentCreatedEvent>>,
    pub on_payout_status_changed: Option<Handler<PayoutStatusChangedEvent>>,
}

impl EventHooks {
    pub fn on_order_view_computed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(OrderViewComputedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_order_view_computed = Some(Arc::new(f));
        self
    }

    pub fn on_report_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(ReportStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_report_status_changed = Some(Arc::new(f));
        self
    }

    pub fn on_payout_created<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutDocumentCreatedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payout_created = Some(Arc::new(f));
        self
    }

    pub fn on_payout_status_changed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PayoutStatusChangedEvent) -> HookFuture) + Send + Sync + 'static {
        self.on_payout_status_changed = Some(Arc::new(f));
        self
    }
}
