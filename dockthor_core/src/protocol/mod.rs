/*!
 * Protocol layer: everything about *what* gets sent.
 *
 * - `auth`: credentials and ingestion URL resolution
 * - `constants`: SDK name/version, defaults, wire markers
 * - `ids`: random ids and timestamps
 * - `metadata`: cached host metadata
 * - `span`: timed units of work
 * - `exception`: captured errors before extraction
 * - `stacktrace`: frame extraction with source context
 * - `event`: the canonical record and its factories
 * - `serializer`: the versioned wire transform
 */

pub mod auth;
pub mod constants;
pub mod event;
pub mod exception;
pub mod ids;
pub mod metadata;
pub mod serializer;
pub mod span;
pub mod stacktrace;
