pub mod dataconnect;
pub mod rpc;
pub mod sqladmin;

pub use dataconnect::{
    CloudSqlInstanceRef, Datasource, Diff, IncompatibleSqlSchemaError, PostgresqlDatasource,
    MIGRATE_COMPATIBLE, SCHEMA_ID, Schema, SchemaSource, SchemaValidation, SourceFile, ViolationType,
};
pub use rpc::{LongRunningOperation, RpcErrorBody, RpcStatus};
pub use sqladmin::{
    Instance, InstanceState, IpMapping, Operation, OperationError, OperationErrorEntry,
    OperationStatus, TestIamPermissionsRequest, TestIamPermissionsResponse, User, UserType,
};
