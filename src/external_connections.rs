use sqlx::PgConnection;

/// Something which can lend out a live database connection
pub trait ConnectionHandle: Send {
    fn borrow_connection(&mut self) -> &mut PgConnection;
}

/// Entrypoint for business logic to reach external systems (currently just the database)
/// without knowing whether it is running inside a transaction
pub trait ExternalConnectivity: Send + Sync {
    type DbHandle<'cxn_borrow>: ConnectionHandle
    where
        Self: 'cxn_borrow;

    /// Acquires a handle to the database
    async fn database_cxn(&mut self) -> Result<Self::DbHandle<'_>, anyhow::Error>;
}

/// ExternalConnectivity which can open a database transaction
pub trait Transactable: ExternalConnectivity {
    type Handle: TransactionHandle;

    /// Begins a transaction. Work done through the returned handle is discarded unless
    /// [TransactionHandle::commit] is called.
    async fn start_transaction(&self) -> Result<Self::Handle, anyhow::Error>;
}

/// ExternalConnectivity bound to an open transaction
pub trait TransactionHandle: ExternalConnectivity {
    async fn commit(self) -> Result<(), anyhow::Error>;
}
