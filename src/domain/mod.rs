// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// This module contains the order aggregate and its state machine.
// The aggregate has its own subdirectory with:
// - Value objects
// - Status state machine
// - Errors
// - Aggregate implementation
//
// This layer is completely separate from the messaging and client-side
// infrastructure.
//
// ============================================================================

pub mod order;
