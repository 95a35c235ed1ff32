//! Default warehouse catalog.
//!
//! Facts used by the catalog: `orders_in_queue` (list), `orders_picked`,
//! `orders_packed`, `pallets_staged`, `shelf_stock`, `truck_load`,
//! `trucks_dispatched` (numbers), `staff_available`, `equipment_available`,
//! `packing_station_free`, `truck_at_dock`, `inventory_counted` (bools).

use std::sync::Arc;
use std::time::Duration;

use super::{Action, DeclaredEffectExecutor};
use crate::world_state::{Constraint, Effect, Operator};

pub const PROCESS_ORDER: &str = "process_order";
pub const PACK_ORDER: &str = "pack_order";
pub const MOVE_PALLET: &str = "move_pallet";
pub const RESTOCK_SHELF: &str = "restock_shelf";
pub const COUNT_INVENTORY: &str = "count_inventory";
pub const LOAD_TRUCK: &str = "load_truck";
pub const DISPATCH_TRUCK: &str = "dispatch_truck";

/// Build the warehouse actions.
///
/// With `simulate_latency`, each executor sleeps for the action's estimated
/// duration before reporting its declared effects.
pub fn warehouse_actions(simulate_latency: bool) -> Vec<Action> {
    let actions = vec![
        Action::new(PROCESS_ORDER, "Process order")
            .with_description("Pick the next queued order off the shelves")
            .with_precondition("staff_available", Constraint::literal(true))
            .with_precondition("orders_in_queue", Constraint::compare(Operator::Gt, 0))
            .with_effect("orders_in_queue", Effect::Delta(-1.0))
            .with_effect("orders_picked", Effect::Delta(1.0))
            .with_cost(1.0)
            .with_duration_ms(200),
        Action::new(PACK_ORDER, "Pack order")
            .with_description("Pack a picked order at a free packing station")
            .with_precondition("orders_picked", Constraint::compare(Operator::Ge, 1))
            .with_precondition("packing_station_free", Constraint::literal(true))
            .with_effect("orders_picked", Effect::Delta(-1.0))
            .with_effect("orders_packed", Effect::Delta(1.0))
            .with_cost(1.0)
            .with_duration_ms(150),
        Action::new(MOVE_PALLET, "Move pallet")
            .with_description("Stage a pallet from receiving to the aisles")
            .with_precondition("equipment_available", Constraint::literal(true))
            .with_effect("pallets_staged", Effect::Delta(1.0))
            .with_cost(2.0)
            .with_duration_ms(400),
        Action::new(RESTOCK_SHELF, "Restock shelf")
            .with_description("Break down a staged pallet onto the shelves")
            .with_precondition("equipment_available", Constraint::literal(true))
            .with_precondition("pallets_staged", Constraint::compare(Operator::Ge, 1))
            .with_effect("pallets_staged", Effect::Delta(-1.0))
            .with_effect("shelf_stock", Effect::Delta(10.0))
            .with_cost(2.0)
            .with_duration_ms(500),
        Action::new(COUNT_INVENTORY, "Count inventory")
            .with_description("Cycle-count the shelves")
            .with_effect("inventory_counted", Effect::set(true))
            .with_cost(1.0)
            .with_duration_ms(300),
        Action::new(LOAD_TRUCK, "Load truck")
            .with_description("Load one packed order onto the docked truck")
            .with_precondition("truck_at_dock", Constraint::literal(true))
            .with_precondition("equipment_available", Constraint::literal(true))
            .with_precondition("orders_packed", Constraint::compare(Operator::Ge, 1))
            .with_effect("orders_packed", Effect::Delta(-1.0))
            .with_effect("truck_load", Effect::Delta(1.0))
            .with_cost(2.0)
            .with_duration_ms(350),
        Action::new(DISPATCH_TRUCK, "Dispatch truck")
            .with_description("Send the loaded truck out")
            .with_precondition("truck_at_dock", Constraint::literal(true))
            .with_precondition("truck_load", Constraint::compare(Operator::Ge, 1))
            .with_effect("truck_at_dock", Effect::set(false))
            .with_effect("truck_load", Effect::set(0))
            .with_effect("trucks_dispatched", Effect::Delta(1.0))
            .with_cost(3.0)
            .with_duration_ms(250),
    ];

    if !simulate_latency {
        return actions;
    }
    actions
        .into_iter()
        .map(|action| {
            let executor = DeclaredEffectExecutor::new(
                action.effects.clone(),
                Duration::from_millis(action.estimated_duration_ms),
            );
            action.with_executor(Arc::new(executor))
        })
        .collect()
}
