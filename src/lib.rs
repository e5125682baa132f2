/*!
# Chart Studio

A small chart studio backend, built in Rust.

## Overview

Users register and log in, upload CSV files (or seed pre-packaged datasets),
and the backend turns the selected columns into Plotly-shaped chart
definitions (`data` + `layout`) that are stored as documents. A community
feed returns a random sample of everything stored.

## Architecture

### Chart Pipeline
- **Ingest** - Reads an uploaded CSV into row records keyed by header name
- **Classifier** - Decides which selected columns are numeric
- **Graph Builder** - Produces scatter, line or bar traces plus a layout
- **Chart Store** - Persists the resulting document and samples the feed

Control flow is strictly Ingest → Graph Builder → Chart Store. A failure at
any step aborts the request before anything is persisted, and the temporary
upload is removed on every exit path.

### Accounts
- **Users** - Argon2-hashed credentials kept in a JSON user database
- **Tokens** - JWT access and refresh tokens signed with injected secrets
- **Login** - Registration, login, refresh rotation, logout and the
  authentication middleware

### Web Layer (feature `web`)
- **Technologies**: Rust, axum, tower-http
- JSON envelope `{ success, data, message }` for every endpoint

## Modules

- **config**: Environment-driven configuration
- **error**: Error taxonomy shared by every layer
- **ingest**: CSV ingest into row records
- **classify**: Numeric column detection and value coercion
- **plotly**: Trace and layout types serialized in Plotly's JSON shape
- **graph**: Per-kind trace construction
- **document**: The persisted chart document
- **store**: Chart persistence (file and in-memory)
- **upload**: Scoped temporary upload files
- **service**: The create-from-CSV pipeline and community feed
- **users**: User database and password hashing
- **tokens**: Access/refresh token issuing and verification
- **login**: Account operations and their HTTP handlers
- **app**: Routing and chart handlers

## REST API Endpoints

- `POST /api/v1/users/register` - Create an account
- `POST /api/v1/users/login` - Log in, receive access and refresh tokens
- `POST /api/v1/users/logout` - Revoke the refresh token
- `POST /api/v1/users/refresh-token` - Rotate tokens
- `POST /api/v1/users/change-password` - Change the current password
- `GET  /api/v1/users/current-user` - Current account
- `GET  /api/v1/graphs/community-feed` - Random sample of stored charts
- `POST /api/v1/graphs/create-from-csv` - Build and store a chart from a CSV upload
- `GET  /api/v1/graphs/mine` - Charts owned by the caller
- `GET  /api/v1/graphs/{id}` - A single chart
*/

pub mod classify;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod ingest;
pub mod login;
pub mod plotly;
pub mod service;
pub mod store;
pub mod tokens;
pub mod upload;
pub mod users;

#[cfg(feature = "web")]
pub mod app;

/// Re-export the types most callers need
pub use config::Config;
pub use document::{ChartDocument, ChartMeta};
pub use error::*;
pub use graph::{BuiltChart, ChartKind, build_chart};
pub use ingest::{Dataset, RowReader, RowRecord};
pub use plotly::{Layout, Trace};
pub use store::{ChartStore, FileChartStore, MemoryChartStore};
