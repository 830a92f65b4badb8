//! DM8 statements issued by the built-in probes.
//!
//! Every statement carries the `DM_EXPORTER` hint so exporter traffic can be
//! told apart in the server's SQL log.

pub const SYSTEM_INFO: &str = "SELECT /*+DM_EXPORTER*/ N_CPU, TOTAL_PHY_SIZE, TOTAL_VIR_SIZE, TOTAL_DISK_SIZE FROM V$SYSTEMINFO";

pub const BUFFER_POOL: &str = "SELECT /*+DM_EXPORTER*/ NAME, CAST(SUM(RAT_HIT) / COUNT(*) AS DECIMAL(10,4)) HIT_RATE \
     FROM V$BUFFERPOOL GROUP BY NAME";

pub const MEMORY_POOL: &str = "SELECT /*+DM_EXPORTER*/ NAME ZONE_TYPE, DATA_SIZE CURR_VAL, RESERVED_SIZE RES_VAL, TOTAL_SIZE TOTAL_VAL \
     FROM V$MEM_POOL WHERE IS_SHARED = 'Y'";

pub const PARAMETER: &str = "SELECT /*+DM_EXPORTER*/ PARA_NAME, PARA_VALUE FROM V$DM_INI \
     WHERE PARA_NAME IN ('MAX_SESSIONS', 'MAX_SESSION_STATEMENT', 'BUFFER', 'MEMORY_POOL', 'MAX_OS_MEMORY')";

pub const STATEMENT_TYPE: &str = "SELECT /*+DM_EXPORTER*/ NAME, STAT_VAL FROM V$SYSSTAT \
     WHERE NAME IN ('select statements', 'insert statements', 'delete statements', 'update statements', \
     'ddl statements', 'commit count', 'rollback count')";

pub const PURGE: &str = "SELECT /*+DM_EXPORTER*/ OBJ_NUM, IS_RUNNING, PURG_FOR_TS FROM V$PURGE";

pub const RAPPLY_TIME_DIFF: &str = "SELECT /*+DM_EXPORTER*/ DATEDIFF(SS, LAST_CMT_TIME, APPLY_CMT_TIME) TIME_DIFF FROM V$RAPPLY_STAT";

pub const DUAL: &str = "SELECT /*+DM_EXPORTER*/ 1 FROM DUAL";

pub const JOB_ERRORS: &str = "SELECT /*+DM_EXPORTER*/ COUNT(*) ERROR_NUM FROM SYSJOB.SYSJOBHISTORIES2 \
     WHERE ERRCODE <> 0 AND START_TIME > SYSDATE - 1";

pub const USER_LIST: &str = "SELECT /*+DM_EXPORTER*/ A.USERNAME, CASE B.RO_FLAG WHEN 1 THEN 'Y' ELSE 'N' END READ_ONLY, A.ACCOUNT_STATUS, \
     TO_CHAR(A.EXPIRY_DATE, 'YYYY-MM-DD HH24:MI:SS') EXPIRY_DATE, TO_CHAR(TRUNC(A.EXPIRY_DATE - SYSDATE)) EXPIRY_DATE_DAY, \
     A.DEFAULT_TABLESPACE, A.PROFILE, TO_CHAR(A.CREATED, 'YYYY-MM-DD HH24:MI:SS') CREATE_TIME \
     FROM DBA_USERS A JOIN SYSUSERS B ON A.USER_ID = B.ID";

pub const MONITOR: &str = "SELECT /*+DM_EXPORTER*/ DW_CONN_TIME, MON_CONFIRM, MON_ID, MON_IP, MON_VERSION, MID FROM V$DMMONITOR";

pub const MONITOR_EXISTS: &str = "SELECT /*+DM_EXPORTER*/ COUNT(1) FROM V$DYNAMIC_TABLES WHERE NAME = 'V$DMMONITOR'";

pub const TABLESPACE: &str = "SELECT /*+DM_EXPORTER*/ T.NAME TABLESPACE_NAME, \
     SUM(F.TOTAL_SIZE) * PAGE() TOTAL_SIZE, SUM(F.FREE_SIZE) * PAGE() FREE_SIZE \
     FROM V$TABLESPACE T JOIN V$DATAFILE F ON T.ID = F.GROUP_ID GROUP BY T.NAME";

pub const TABLESPACE_DATAFILE: &str = "SELECT /*+DM_EXPORTER*/ PATH, TOTAL_SIZE * PAGE() TOTAL_SIZE, FREE_SIZE * PAGE() FREE_SIZE, \
     AUTO_EXTEND, NEXT_SIZE, MAX_SIZE FROM V$DATAFILE";

pub const INSTANCE_LOG_ERROR: &str = "SELECT /*+DM_EXPORTER*/ TO_CHAR(LOG_TIME, 'YYYY-MM-DD HH24:MI:SS') LOG_TIME, PID, LEVEL$, TXT \
     FROM V$INSTANCE_LOG_HISTORY WHERE LEVEL$ IN ('ERROR', 'FATAL') AND LOG_TIME > SYSDATE - 5 / 1440 \
     ORDER BY LOG_TIME DESC";

pub const VERSION_DETAILED: &str = "SELECT /*+DM_EXPORTER*/ ID_CODE, BUILD_TYPE, INNER_VER FROM V$INSTANCE";

pub const VERSION_HAS_BUILD_COLUMN: &str = "SELECT /*+DM_EXPORTER*/ POSITION('BUILD_VERSION', TO_CHAR(TABLEDEF('SYS', 'V$INSTANCE'))) POS FROM DUAL";

pub const VERSION_WITH_BUILD: &str = "SELECT /*+DM_EXPORTER*/ SVR_VERSION || '-' || BUILD_VERSION VERSION FROM V$INSTANCE";

pub const VERSION_BANNER: &str = "SELECT /*+DM_EXPORTER*/ TOP 1 BANNER || ' ' || ID_CODE VERSION FROM V$VERSION \
     WHERE BANNER LIKE 'DM Database Server%'";

pub const ARCH_ENABLED: &str = "SELECT /*+DMDB_CHECK_FLAG*/ PARA_VALUE FROM V$DM_INI WHERE PARA_NAME = 'ARCH_INI'";

pub const ARCH_LOCAL_VALID: &str = "SELECT /*+DMDB_CHECK_FLAG*/ CASE ARCH_STATUS WHEN 'VALID' THEN 1 WHEN 'INVALID' THEN 0 END ARCH_STATUS \
     FROM V$ARCH_STATUS WHERE ARCH_TYPE = 'LOCAL'";

pub const ARCH_STATUS_DETAIL: &str = "SELECT /*+DM_EXPORTER*/ CASE ARCH_STATUS WHEN 'VALID' THEN 1 ELSE 0 END ARCH_STATUS, \
     ARCH_TYPE, ARCH_DEST, ARCH_SRC FROM V$ARCH_STATUS";

pub const ARCH_SEND_DETAIL: &str = "SELECT /*+DM_EXPORTER*/ ARCH_DEST, ARCH_TYPE, CUR_LSN - LAST_SEND_LSN LSN_DIFF, \
     LAST_SEND_CODE, LAST_SEND_DESC, LAST_START_TIME, LAST_END_TIME, LAST_SEND_TIME FROM V$ARCH_SEND_INFO";

pub const ARCH_SEND_DETAIL_WITH_APPLY: &str = "SELECT /*+DM_EXPORTER*/ ARCH_DEST, ARCH_TYPE, LSN_DIFF, \
     LAST_SEND_CODE, LAST_SEND_DESC, LAST_START_TIME, LAST_END_TIME, LAST_SEND_TIME FROM \
     (SELECT S.*, NVL(A.TSK_MAX_LSN, S.CUR_LSN) - S.LAST_SEND_LSN LSN_DIFF \
     FROM V$ARCH_SEND_INFO S LEFT JOIN V$ARCH_APPLY_INFO A ON S.ARCH_DEST = A.ARCH_DEST)";

pub const ARCH_APPLY_INFO_EXISTS: &str = "SELECT /*+DM_EXPORTER*/ COUNT(1) FROM V$DYNAMIC_TABLES WHERE NAME = 'V$ARCH_APPLY_INFO'";

pub const ARCH_SEND_CODE_COLUMNS: &str = "SELECT /*+DM_EXPORTER*/ COUNT(*) FROM SYSCOLUMNS \
     WHERE ID = (SELECT ID FROM SYSOBJECTS WHERE NAME = 'V$ARCH_SEND_INFO') \
     AND NAME IN ('LAST_SEND_CODE', 'LAST_SEND_DESC')";

pub const ARCH_SWITCH_RATE: &str = "SELECT /*+DM_EXPORTER*/ TOP 1 STATUS, CREATE_TIME, PATH, CLSN, SRC_DB_MAGIC, \
     DATEDIFF(MI, LAG(CREATE_TIME) OVER (ORDER BY CREATE_TIME), CREATE_TIME) MINUS_DIFF \
     FROM V$ARCH_FILE ORDER BY CREATE_TIME DESC";
